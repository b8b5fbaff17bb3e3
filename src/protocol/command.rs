//! Decoded requests.

/// One request: a verb plus its arguments, in the order they were sent.
///
/// The verb is kept exactly as the client spelled it; matching is
/// case-insensitive and happens in the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Builds a command from string slices; the first element is the verb.
    ///
    /// Returns `None` for an empty slice.
    pub fn from_parts(parts: &[&str]) -> Option<Self> {
        let (name, args) = parts.split_first()?;
        Some(Self::new(
            *name,
            args.iter().map(|s| s.to_string()).collect(),
        ))
    }

    /// Encodes the command as a request frame (an array of bulk strings).
    pub fn to_frame(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        let parts: Vec<&str> = std::iter::once(self.name.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect();
        super::types::encode_array(&mut buf, Some(parts.as_slice()));
        buf
    }
}
