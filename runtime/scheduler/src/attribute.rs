use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

static NEXT_ATTRIBUTE_ID: AtomicU32 = AtomicU32::new(1);

/// Process-wide tag identifying a scheduler or classifying work. Each
/// Attribute carries a unique id and a display name; two Attributes created
/// with the same name still compare unequal.
#[derive(Clone, Debug)]
pub struct Attribute {
    id: u32,
    name: Arc<str>,
}

impl Attribute {
    /// Mints a new Attribute with the next free id.
    pub fn create(name: impl Into<Arc<str>>) -> Self {
        Self {
            id: NEXT_ATTRIBUTE_ID.fetch_add(1, Ordering::SeqCst),
            name: name.into(),
        }
    }

    /// Well-known tag for general background work.
    pub fn regular() -> Self {
        static REGULAR: OnceLock<Attribute> = OnceLock::new();
        REGULAR
            .get_or_init(|| Attribute::create("scheduler-regular"))
            .clone()
    }

    /// Well-known tag for the scheduler with main-thread affinity.
    pub fn rendering() -> Self {
        static RENDERING: OnceLock<Attribute> = OnceLock::new();
        RENDERING
            .get_or_init(|| Attribute::create("scheduler-rendering"))
            .clone()
    }

    /// Well-known tag for best-effort work.
    pub fn non_critical() -> Self {
        static NON_CRITICAL: OnceLock<Attribute> = OnceLock::new();
        NON_CRITICAL
            .get_or_init(|| Attribute::create("scheduler-non-critical"))
            .clone()
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// The display name. Diagnostics only; identity is the id.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Attribute {}

impl Hash for Attribute {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Attribute {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Attribute {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
