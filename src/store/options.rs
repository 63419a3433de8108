use std::num::NonZeroUsize;

/// Construction options for a [`Store`](super::Store).
///
/// # Examples
///
/// ```
/// use std::num::NonZeroUsize;
/// use specks::StoreOptions;
///
/// let options = StoreOptions::new()
///     .name("settings")
///     .max_notify_depth(NonZeroUsize::new(4).unwrap());
/// assert_eq!(options.label(), "settings");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreOptions {
    name: Option<String>,
    max_notify_depth: Option<NonZeroUsize>,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label the store in log output.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Cap how many notify passes may be nested through re-entrant updates.
    ///
    /// An update issued while `depth` passes are already running does not
    /// start another one. The innermost running pass is repeated once it
    /// finishes, so listeners still see the final state. Without a cap,
    /// nested passes recurse freely.
    pub fn max_notify_depth(mut self, depth: NonZeroUsize) -> Self {
        self.max_notify_depth = Some(depth);
        self
    }

    pub fn name_ref(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn notify_depth(&self) -> Option<NonZeroUsize> {
        self.max_notify_depth
    }

    /// The name used in log lines.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("store")
    }
}
