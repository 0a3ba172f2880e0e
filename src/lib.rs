#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

use std::{
    error::Error,
    fmt::{self, Display},
};

use facet_core::{
    Def, Facet, Field, FieldAttribute, NumericType, PrimitiveType, Shape, ShapeLayout, Type,
    UserType,
};
use facet_reflect::{Partial, ReflectError};
use url::Url;

mod serialize;

pub use serialize::{to_string, to_string_with};

/// Error type for URI deserialization.
#[derive(Debug)]
pub struct UriError {
    kind: UriErrorKind,
}

impl UriError {
    /// Returns a reference to the error kind for detailed error inspection.
    pub fn kind(&self) -> &UriErrorKind {
        &self.kind
    }
}

impl Display for UriError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> fmt::Result {
        let kind = &self.kind;
        write!(f, "{kind}")
    }
}
impl Error for UriError {}

impl<K: Into<UriErrorKind>> From<K> for UriError {
    fn from(value: K) -> Self {
        let kind = value.into();
        UriError { kind }
    }
}

/// Detailed classification of URI errors.
#[derive(Debug)]
#[non_exhaustive]
pub enum UriErrorKind {
    /// The target type is not a struct.
    InvalidTargetShape(&'static Shape),
    /// Failed to split the URI into its components.
    Parse(url::ParseError),
    /// Error from the reflection system while building the record.
    Reflect(ReflectError),
    /// One or more fields could not be bound; the record walk still ran to
    /// completion and every failure is collected here.
    Fields(FieldErrors),
}

impl Display for UriErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UriErrorKind::InvalidTargetShape(shape) => {
                write!(f, "invalid target shape {shape} — needed a struct")
            }
            UriErrorKind::Parse(parse_error) => write!(f, "{parse_error}"),
            UriErrorKind::Reflect(reflect_error) => write!(f, "{reflect_error}"),
            UriErrorKind::Fields(field_errors) => write!(f, "{field_errors}"),
        }
    }
}

impl From<url::ParseError> for UriErrorKind {
    fn from(value: url::ParseError) -> Self {
        Self::Parse(value)
    }
}

impl From<ReflectError> for UriErrorKind {
    fn from(value: ReflectError) -> Self {
        Self::Reflect(value)
    }
}

impl From<FieldErrors> for UriErrorKind {
    fn from(value: FieldErrors) -> Self {
        Self::Fields(value)
    }
}

/// Collection of per-field binding failures.
///
/// Identical messages are deduplicated and counted; distinct messages keep
/// their first-occurrence order. The `Display` output is one line per
/// distinct message, prefixed with `[N] ` when it occurred N > 1 times.
#[derive(Debug, Default)]
pub struct FieldErrors {
    entries: Vec<FieldErrorEntry>,
}

#[derive(Debug)]
struct FieldErrorEntry {
    message: String,
    count: usize,
}

impl FieldErrors {
    fn push(&mut self, message: String) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.message == message) {
            entry.count += 1;
        } else {
            self.entries.push(FieldErrorEntry { message, count: 1 });
        }
    }

    /// Returns true when no failure was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct failure messages.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Distinct messages with their occurrence counts, in first-occurrence
    /// order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|e| (e.message.as_str(), e.count))
    }
}

impl Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            if entry.count > 1 {
                write!(f, "[{}] {}", entry.count, entry.message)?;
            } else {
                write!(f, "{}", entry.message)?;
            }
        }
        Ok(())
    }
}

/// Call-scoped configuration shared by both directions of the codec.
///
/// There is deliberately no process-wide state: build one of these (or rely
/// on [`UriOptions::default`]) and pass it to [`from_str_with`] /
/// [`to_string_with`].
#[derive(Debug, Clone)]
pub struct UriOptions {
    separator: String,
}

impl Default for UriOptions {
    fn default() -> Self {
        UriOptions {
            separator: ",".to_string(),
        }
    }
}

impl UriOptions {
    /// Options with the default separator (`,`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the separator used to join repeated query values into one
    /// list-bound string and to split/join `Vec` elements. Must not be
    /// empty.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        debug_assert!(!self.separator.is_empty());
        self
    }

    pub(crate) fn separator(&self) -> &str {
        &self.separator
    }
}

/// Positional binding of a field to a URI structural component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UriComponent {
    Scheme,
    Host,
    Path,
    /// `scheme://host`; deserialization only.
    Authority,
    /// `scheme://host/path`; deserialization only.
    Origin,
}

/// The reserved attribute set is matched case-insensitively.
pub(crate) fn positional_binding(field: &Field) -> Option<UriComponent> {
    field.attributes.iter().find_map(|attribute| match attribute {
        FieldAttribute::Arbitrary(name) if name.eq_ignore_ascii_case("scheme") => {
            Some(UriComponent::Scheme)
        }
        FieldAttribute::Arbitrary(name) if name.eq_ignore_ascii_case("host") => {
            Some(UriComponent::Host)
        }
        FieldAttribute::Arbitrary(name) if name.eq_ignore_ascii_case("path") => {
            Some(UriComponent::Path)
        }
        FieldAttribute::Arbitrary(name) if name.eq_ignore_ascii_case("authority") => {
            Some(UriComponent::Authority)
        }
        FieldAttribute::Arbitrary(name) if name.eq_ignore_ascii_case("origin") => {
            Some(UriComponent::Origin)
        }
        _ => None,
    })
}

pub(crate) fn is_skipped(field: &Field) -> bool {
    field.attributes.contains(&FieldAttribute::Arbitrary("skip"))
}

/// The components of a split URI, as handed to us by the `url` crate.
/// Fragment and userinfo are discarded; the query is kept as an ordered
/// multimap so repeated keys survive.
struct UriParts {
    scheme: String,
    host: String,
    path: String,
    query: Vec<(String, String)>,
}

impl UriParts {
    fn parse(uri: &str) -> Result<Self> {
        match Url::parse(uri) {
            Ok(url) => {
                // host here means authority minus userinfo, port included
                let host = match (url.host_str(), url.port()) {
                    (Some(host), Some(port)) => format!("{host}:{port}"),
                    (Some(host), None) => host.to_string(),
                    (None, _) => String::new(),
                };
                Ok(UriParts {
                    scheme: url.scheme().to_string(),
                    host,
                    path: url.path().to_string(),
                    query: parse_query(url.query().unwrap_or("")),
                })
            }
            Err(url::ParseError::RelativeUrlWithoutBase) => Self::parse_relative(uri),
            Err(parse_error) => Err(UriErrorKind::Parse(parse_error).into()),
        }
    }

    /// A reference with no scheme and no authority: split off query and
    /// fragment, the rest is the path.
    fn parse_relative(uri: &str) -> Result<Self> {
        let rest = match uri.split_once('#') {
            Some((rest, _fragment)) => rest,
            None => uri,
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, query),
            None => (rest, ""),
        };
        // a relative reference's first segment must not contain a colon
        if path.split('/').next().unwrap_or("").contains(':') {
            return Err(UriErrorKind::Parse(url::ParseError::RelativeUrlWithoutBase).into());
        }
        Ok(UriParts {
            scheme: String::new(),
            host: String::new(),
            path: path.to_string(),
            query: parse_query(query),
        })
    }

    fn component(&self, component: UriComponent) -> String {
        match component {
            UriComponent::Scheme => self.scheme.clone(),
            UriComponent::Host => self.host.clone(),
            UriComponent::Path => self.path.clone(),
            UriComponent::Authority => format!("{}://{}", self.scheme, self.host),
            UriComponent::Origin => {
                if self.scheme.is_empty() && self.host.is_empty() {
                    self.path.clone()
                } else {
                    format!("{}://{}{}", self.scheme, self.host, self.path)
                }
            }
        }
    }

    /// All query values recorded under `name`, in query order. Keys are
    /// matched case-sensitively.
    fn values(&self, name: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .collect()
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

/// Why a single field could not be bound. Recorded and reported in
/// aggregate; never aborts the walk.
enum AssignError {
    /// The source string does not convert into the field's shape.
    Invalid,
    /// The field's shape has no dispatch rule.
    Unsupported(&'static Shape),
    /// The reflection system rejected the assignment.
    Reflect(ReflectError),
}

impl From<ReflectError> for AssignError {
    fn from(value: ReflectError) -> Self {
        AssignError::Reflect(value)
    }
}

struct UriDeserializer<'opts> {
    parts: UriParts,
    options: &'opts UriOptions,
}

type Result<T> = std::result::Result<T, UriError>;

impl<'opts, 'facet> UriDeserializer<'opts> {
    fn from_str<T: Facet<'facet>>(uri: &str, options: &'opts UriOptions) -> Result<T> {
        log::trace!("Entering `from_str` method");

        if !matches!(T::SHAPE.ty, Type::User(UserType::Struct(_))) {
            return Err(UriErrorKind::InvalidTargetShape(T::SHAPE).into());
        }

        let parts = UriParts::parse(uri)?;
        log::trace!("URI split into components");

        let mut typed_partial = Partial::alloc::<T>()?;
        log::trace!(
            "Allocated WIP for type {}",
            typed_partial.inner_mut().shape()
        );

        {
            let partial = typed_partial.inner_mut();
            Self { parts, options }.deserialize_record(partial)?;
        }

        let boxed_value = typed_partial.build()?;
        log::trace!("WIP fully built");

        Ok(*boxed_value)
    }

    fn deserialize_record(&mut self, partial: &mut Partial<'facet>) -> Result<()> {
        log::trace!("Entering `deserialize_record` method at {}", partial.path());

        let struct_def = match partial.shape().ty {
            Type::User(UserType::Struct(struct_def)) => struct_def,
            _ => return Err(UriErrorKind::InvalidTargetShape(partial.shape()).into()),
        };

        let mut errs = FieldErrors::default();
        for (idx, field) in struct_def.fields.iter().enumerate() {
            if is_skipped(field) {
                log::trace!("Skipping field '{}'", field.name);
                continue;
            }

            let name = field.name;
            let field_shape = field.shape;

            let data = match positional_binding(field) {
                Some(component) => Some(self.parts.component(component)),
                None => {
                    let values = self.parts.values(name);
                    if values.is_empty() {
                        // untouched; the default pass below covers it
                        None
                    } else if matches!(field_shape.def, Def::List(_)) {
                        // repeated `?x=1&x=2` and a single `?x=1,2` read
                        // identically for list fields
                        Some(values.join(self.options.separator()))
                    } else {
                        Some(values[0].to_string())
                    }
                }
            };

            let data = match data {
                Some(data) => data,
                None => continue,
            };

            // Validate the conversion against a scratch value first; a
            // failing field must leave the record under construction
            // untouched.
            match self.convert(field_shape, &data) {
                Ok(()) => {
                    partial.begin_nth_field(idx)?;
                    if let Err(assign_error) = self.set_value(partial, &data) {
                        // the same conversion just succeeded on the scratch
                        // value, so only reflection plumbing can land here
                        return Err(match assign_error {
                            AssignError::Reflect(reflect_error) => {
                                UriErrorKind::Reflect(reflect_error).into()
                            }
                            _ => UriErrorKind::InvalidTargetShape(field_shape).into(),
                        });
                    }
                    partial.end()?;
                }
                Err(AssignError::Unsupported(shape)) => {
                    errs.push(format!("unsupported shape {shape} for field {name}"));
                }
                Err(_) => {
                    errs.push(format!("cannot assign \"{data}\" to {name} ({field_shape})"));
                }
            }
        }

        // unset fields fall back to their declared default, or the type's
        // Default when none was declared
        for (idx, field) in struct_def.fields.iter().enumerate() {
            if !partial.is_field_set(idx)? {
                let default_result = (|| -> std::result::Result<(), ReflectError> {
                    partial.begin_nth_field(idx)?;
                    match field.vtable.default_fn {
                        Some(default_fn) => {
                            partial.set_field_default(default_fn)?;
                        }
                        None => {
                            partial.set_default()?;
                        }
                    }
                    partial.end()?;
                    Ok(())
                })();
                if let Err(reflect_error) = default_result {
                    if errs.is_empty() {
                        return Err(UriErrorKind::Reflect(reflect_error).into());
                    }
                    // a failed conversion above already explains this field
                    errs.push(format!("cannot default field {}: {reflect_error}", field.name));
                }
            }
        }

        log::trace!("Exiting `deserialize_record` method at {}", partial.path());

        if errs.is_empty() {
            Ok(())
        } else {
            Err(UriErrorKind::Fields(errs).into())
        }
    }

    /// Run the conversion to completion on a throwaway value of the field's
    /// shape. Only a conversion that survives this (including `build`) is
    /// replayed on the real record.
    fn convert(&self, shape: &'static Shape, data: &str) -> std::result::Result<(), AssignError> {
        let mut scratch = Partial::alloc_shape(shape)?;
        self.set_value(&mut scratch, data)?;
        scratch.build()?;
        Ok(())
    }

    /// Shape-directed assignment of one source string into the current
    /// frame.
    fn set_value(
        &self,
        partial: &mut Partial<'facet>,
        s: &str,
    ) -> std::result::Result<(), AssignError> {
        let shape = partial.shape();
        log::trace!("Assigning {s:?} into {shape}");

        // Option<T>: build the inner value and wrap it
        if let Def::Option(_) = shape.def {
            partial.begin_some()?;
            self.set_value(partial, s)?;
            partial.end()?;
            return Ok(());
        }

        // Box<T>, Arc<T>, Rc<T>
        if let Def::Pointer(_) = shape.def {
            partial.begin_smart_ptr()?;
            self.set_value(partial, s)?;
            partial.end()?;
            return Ok(());
        }

        // Vec<T>: split on the separator and assign each element
        if let Def::List(_) = shape.def {
            partial.begin_list()?;
            if !s.is_empty() {
                for element in s.split(self.options.separator()) {
                    partial.begin_list_item()?;
                    self.set_value(partial, element)?;
                    partial.end()?;
                }
            }
            return Ok(());
        }

        if shape.is_type::<String>() {
            partial.set(s.to_string())?;
            return Ok(());
        }

        if shape.is_type::<bool>() {
            // "true" in any case reads as true, as does a bare key with no
            // value (`?verbose`); everything else reads as false
            partial.set(s.eq_ignore_ascii_case("true") || s.is_empty())?;
            return Ok(());
        }

        if shape.is_type::<char>() {
            let mut chars = s.chars();
            return match (chars.next(), chars.next()) {
                (Some(c), None) => {
                    partial.set(c)?;
                    Ok(())
                }
                _ => Err(AssignError::Invalid),
            };
        }

        // usize/isize before the width-keyed numeric dispatch
        if shape.is_type::<usize>() {
            partial.set(s.parse::<usize>().map_err(|_| AssignError::Invalid)?)?;
            return Ok(());
        }
        if shape.is_type::<isize>() {
            partial.set(s.parse::<isize>().map_err(|_| AssignError::Invalid)?)?;
            return Ok(());
        }

        if let Type::Primitive(PrimitiveType::Numeric(numeric_type)) = shape.ty {
            return self.set_numeric(partial, s, numeric_type, shape);
        }

        // named scalars and record types exposing a text codec (FromStr)
        if shape.vtable.has_parse() {
            log::trace!("Shape {shape} has a parse hook, delegating");
            partial.parse_from_str(s)?;
            return Ok(());
        }

        // unit enums bind by variant name
        if let Type::User(UserType::Enum(_)) = shape.ty {
            partial.select_variant_named(s)?;
            return Ok(());
        }

        // transparent wrappers assign through their inner shape
        if shape.inner.is_some() {
            partial.begin_inner()?;
            self.set_value(partial, s)?;
            partial.end()?;
            return Ok(());
        }

        Err(AssignError::Unsupported(shape))
    }

    fn set_numeric(
        &self,
        partial: &mut Partial<'facet>,
        s: &str,
        numeric_type: NumericType,
        shape: &'static Shape,
    ) -> std::result::Result<(), AssignError> {
        let size = match shape.layout {
            ShapeLayout::Sized(layout) => layout.size(),
            ShapeLayout::Unsized => return Err(AssignError::Unsupported(shape)),
        };
        match (numeric_type, size) {
            // Unsigned integers
            (NumericType::Integer { signed: false }, 1) => partial.set(parse::<u8>(s)?)?,
            (NumericType::Integer { signed: false }, 2) => partial.set(parse::<u16>(s)?)?,
            (NumericType::Integer { signed: false }, 4) => partial.set(parse::<u32>(s)?)?,
            (NumericType::Integer { signed: false }, 8) => partial.set(parse::<u64>(s)?)?,
            (NumericType::Integer { signed: false }, 16) => partial.set(parse::<u128>(s)?)?,
            // Signed integers
            (NumericType::Integer { signed: true }, 1) => partial.set(parse::<i8>(s)?)?,
            (NumericType::Integer { signed: true }, 2) => partial.set(parse::<i16>(s)?)?,
            (NumericType::Integer { signed: true }, 4) => partial.set(parse::<i32>(s)?)?,
            (NumericType::Integer { signed: true }, 8) => partial.set(parse::<i64>(s)?)?,
            (NumericType::Integer { signed: true }, 16) => partial.set(parse::<i128>(s)?)?,
            // Floats
            (NumericType::Float, 4) => partial.set(parse::<f32>(s)?)?,
            (NumericType::Float, 8) => partial.set(parse::<f64>(s)?)?,
            _ => return Err(AssignError::Unsupported(shape)),
        };
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(s: &str) -> std::result::Result<T, AssignError> {
    s.parse().map_err(|_| AssignError::Invalid)
}

/// Deserialize a value of type `T` from a URI string.
///
/// Query parameters are bound to fields by name (or `#[facet(rename)]`
/// alias); fields carrying one of the reserved positional attributes bind to
/// the corresponding URI component instead. Fields with no matching query
/// entry keep their declared `#[facet(default)]` value, or the type's
/// `Default` when none is declared.
///
/// Returns a [`UriError`] when the URI cannot be split, when `T` is not a
/// struct, or — aggregated across the whole record — when individual field
/// values do not convert.
///
/// # Example
/// ```
/// # use facet::Facet;
/// # use facet_uri::from_str;
/// #[derive(Facet, Debug, PartialEq)]
/// struct Params {
///     name: String,
///     count: i32,
/// }
///
/// # fn main() -> Result<(), facet_uri::UriError> {
/// let params: Params = from_str("?name=hello&count=10")?;
/// assert_eq!(params.name, "hello");
/// assert_eq!(params.count, 10);
/// # Ok(())
/// # }
/// ```
pub fn from_str<'facet, T>(uri: &str) -> Result<T>
where
    T: Facet<'facet>,
{
    log::trace!("Entering `from_str` function");

    UriDeserializer::from_str(uri, &UriOptions::default())
}

/// Like [`from_str`], with explicit [`UriOptions`].
///
/// # Example
/// ```
/// # use facet::Facet;
/// # use facet_uri::{UriOptions, from_str_with};
/// #[derive(Facet, Debug, PartialEq)]
/// struct Params {
///     ports: Vec<u16>,
/// }
///
/// # fn main() -> Result<(), facet_uri::UriError> {
/// let options = UriOptions::new().with_separator("|");
/// let params: Params = from_str_with("?ports=80|443", &options)?;
/// assert_eq!(params.ports, vec![80, 443]);
/// # Ok(())
/// # }
/// ```
pub fn from_str_with<'facet, T>(uri: &str, options: &UriOptions) -> Result<T>
where
    T: Facet<'facet>,
{
    log::trace!("Entering `from_str_with` function");

    UriDeserializer::from_str(uri, options)
}
