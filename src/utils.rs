use serde::Serialize;
use serde_json::ser::PrettyFormatter;

/// Serialize as JSON indented with three spaces, the layout used for both
/// the cache file and the `{full}` tooltip placeholder
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"   "));
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
