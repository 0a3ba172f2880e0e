use facet_core::{Facet, Field};
use facet_reflect::{HasFields, HeapValue, Partial, Peek};

use crate::{UriComponent, UriOptions, is_skipped, positional_binding};

/// Serialize a value to a URI string.
///
/// Positional fields (`#[facet(scheme)]`, `#[facet(host)]`,
/// `#[facet(path)]`) are written into the corresponding URI component;
/// every other field becomes a query parameter unless its value equals the
/// field's fallback (the declared `#[facet(default)]` value, or the type's
/// `Default`). `Vec` fields emit one `key=value` pair per element. Query
/// keys are emitted in stable sorted order.
///
/// Serialization never fails: values with no renderable form contribute
/// nothing to the output, and a non-struct value renders as the empty
/// string.
///
/// # Example
/// ```
/// # use facet::Facet;
/// # use facet_uri::to_string;
/// #[derive(Facet)]
/// struct Params {
///     name: String,
///     count: i32,
/// }
///
/// let params = Params {
///     name: "hello".to_string(),
///     count: 10,
/// };
/// assert_eq!(to_string(&params), "?count=10&name=hello");
/// ```
pub fn to_string<'facet, T: Facet<'facet>>(value: &'facet T) -> String {
    to_string_with(value, &UriOptions::default())
}

/// Like [`to_string`], with explicit [`UriOptions`].
pub fn to_string_with<'facet, T: Facet<'facet>>(value: &'facet T, options: &UriOptions) -> String {
    log::trace!("Entering `to_string_with` function");

    let serializer = UriSerializer { options };
    serializer.serialize(Peek::new(value))
}

struct UriSerializer<'opts> {
    options: &'opts UriOptions,
}

impl UriSerializer<'_> {
    fn serialize(&self, peek: Peek<'_, '_>) -> String {
        let struct_peek = match peek.into_struct() {
            Ok(struct_peek) => struct_peek,
            // not a record; serialization never fails
            Err(_) => return String::new(),
        };

        let mut scheme = String::new();
        let mut host = String::new();
        let mut path = String::new();
        let mut pairs: Vec<(String, String)> = Vec::new();

        for (field, field_peek) in struct_peek.fields() {
            if is_skipped(&field) {
                continue;
            }

            match positional_binding(&field) {
                Some(UriComponent::Scheme) => {
                    scheme = self.render_value(field_peek);
                    continue;
                }
                Some(UriComponent::Host) => {
                    host = self.render_value(field_peek);
                    continue;
                }
                Some(UriComponent::Path) => {
                    path = self.render_value(field_peek);
                    continue;
                }
                // parse-time bindings with no emission form
                Some(UriComponent::Authority) | Some(UriComponent::Origin) => continue,
                None => {}
            }

            let rendered = self.render_value(field_peek);

            // values equal to the field's fallback are not emitted
            if let Some(baseline) = field_baseline(&field) {
                if self.render_value(baseline.peek()) == rendered {
                    log::trace!("Skipping field '{}' at its fallback value", field.name);
                    continue;
                }
            }

            if let Ok(list_peek) = field_peek.into_list() {
                for item in list_peek.iter() {
                    pairs.push((field.name.to_string(), self.render_value(item)));
                }
            } else {
                pairs.push((field.name.to_string(), rendered));
            }
        }

        // stable sort: element order within one key is preserved
        pairs.sort_by(|a, b| a.0.cmp(&b.0));

        let mut query_serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in &pairs {
            query_serializer.append_pair(key, value);
        }
        let query = query_serializer.finish();

        let mut out = String::new();
        if !scheme.is_empty() {
            out.push_str(&scheme);
            out.push(':');
        }
        if !host.is_empty() {
            out.push_str("//");
            out.push_str(&host);
        }
        out.push_str(&path);
        if !query.is_empty() {
            out.push('?');
            out.push_str(&query);
        }
        out
    }

    /// Shape-directed rendering of one value to its query-string form.
    /// Mirrors the assignment dispatcher; anything without a rule renders
    /// as the empty string.
    fn render_value(&self, peek: Peek<'_, '_>) -> String {
        // None renders as the literal "nil"
        if let Ok(option_peek) = peek.into_option() {
            return match option_peek.value() {
                Some(inner) => self.render_value(inner),
                None => "nil".to_string(),
            };
        }

        if let Some(s) = peek.as_str() {
            return s.to_string();
        }

        if let Ok(v) = peek.get::<bool>() {
            return if *v { "true" } else { "false" }.to_string();
        }

        if let Ok(v) = peek.get::<i8>() {
            return v.to_string();
        }
        if let Ok(v) = peek.get::<i16>() {
            return v.to_string();
        }
        if let Ok(v) = peek.get::<i32>() {
            return v.to_string();
        }
        if let Ok(v) = peek.get::<i64>() {
            return v.to_string();
        }
        if let Ok(v) = peek.get::<i128>() {
            return v.to_string();
        }
        if let Ok(v) = peek.get::<isize>() {
            return v.to_string();
        }

        if let Ok(v) = peek.get::<u8>() {
            return v.to_string();
        }
        if let Ok(v) = peek.get::<u16>() {
            return v.to_string();
        }
        if let Ok(v) = peek.get::<u32>() {
            return v.to_string();
        }
        if let Ok(v) = peek.get::<u64>() {
            return v.to_string();
        }
        if let Ok(v) = peek.get::<u128>() {
            return v.to_string();
        }
        if let Ok(v) = peek.get::<usize>() {
            return v.to_string();
        }

        if let Ok(v) = peek.get::<f32>() {
            return v.to_string();
        }
        if let Ok(v) = peek.get::<f64>() {
            return v.to_string();
        }

        if let Ok(v) = peek.get::<char>() {
            return v.to_string();
        }

        if let Ok(list_peek) = peek.into_list() {
            let elements: Vec<String> = list_peek
                .iter()
                .map(|item| self.render_value(item))
                .collect();
            return elements.join(self.options.separator());
        }

        // scalars carrying a text codec render through it
        if peek.shape().vtable.has_display() {
            return peek.to_string();
        }

        // unit enums render as their active variant name
        if let Ok(enum_peek) = peek.into_enum() {
            if let Ok(variant_name) = enum_peek.variant_name_active() {
                return variant_name.to_string();
            }
        }

        // smart pointers and transparent wrappers render as their contents
        let inner = peek.innermost_peek();
        if !std::ptr::eq(inner.shape(), peek.shape()) {
            return self.render_value(inner);
        }

        String::new()
    }
}

/// The value a field falls back to: its declared default when one exists,
/// the type's `Default` otherwise. `None` when neither can be materialized;
/// such fields are always emitted.
fn field_baseline(field: &Field) -> Option<HeapValue<'static>> {
    let shape = field.shape;
    let mut wip = Partial::alloc_shape(shape).ok()?;
    match field.vtable.default_fn {
        Some(default_fn) => {
            wip.set_field_default(default_fn).ok()?;
        }
        None => {
            wip.set_default().ok()?;
        }
    }
    wip.build().ok()
}
