use crate::BagError;

/// Maximum length of a text line guaranteed by POSIX utilities on Linux.
pub const LINE_MAX: usize = 2048;

/// Default capacity of a single slot in bytes.
pub const DEFAULT_SLOT_CAPACITY: usize = 16 * LINE_MAX;

/// Environment variable overriding the slot capacity for one run.
pub const SLOT_SIZE_ENV: &str = "LINEBAG_SLOT_SIZE";

/// Environment variable selecting the log level of the binary.
pub const LOG_LEVEL_ENV: &str = "LINEBAG_LOG";

/// Configuration for the ring buffer and the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Number of slots in the ring (at least 2, one is never addressable)
    pub slots: usize,
    /// Capacity of each slot in bytes
    pub slot_capacity: usize,
    /// Enable metrics collection
    pub enable_metrics: bool,
}

impl Config {
    /// Creates a new configuration with custom settings.
    pub const fn new(slots: usize, slot_capacity: usize, enable_metrics: bool) -> Self {
        Self {
            slots,
            slot_capacity,
            enable_metrics,
        }
    }

    /// Number of complete records the ring can hold at once.
    #[inline]
    pub const fn usable_slots(&self) -> usize {
        self.slots.saturating_sub(1)
    }

    /// Size of the contiguous backing region, or `None` on overflow.
    #[inline]
    pub const fn backing_len(&self) -> Option<usize> {
        self.slots.checked_mul(self.slot_capacity)
    }

    /// Sets the slot count.
    pub fn with_slots(mut self, slots: usize) -> Self {
        self.slots = slots;
        self
    }

    /// Sets the per-slot capacity.
    pub fn with_slot_capacity(mut self, slot_capacity: usize) -> Self {
        self.slot_capacity = slot_capacity;
        self
    }

    /// Turns metrics collection on or off.
    pub fn with_metrics(mut self, enable_metrics: bool) -> Self {
        self.enable_metrics = enable_metrics;
        self
    }

    /// Checks the limits the circular-queue discipline depends on.
    pub fn validate(&self) -> Result<(), BagError> {
        if self.slots < 2 {
            return Err(BagError::Argument(format!(
                "slot count must be at least 2, got {}",
                self.slots
            )));
        }
        if self.slot_capacity == 0 {
            return Err(BagError::Argument("slot size must be at least 1 byte".into()));
        }
        Ok(())
    }

    /// Builds a configuration from the positional arguments (program name
    /// excluded) and the optional slot size override.
    ///
    /// Exactly one positional argument is accepted: the slot count.
    /// Metrics are always enabled for the command-line tool.
    pub fn from_cli<S: AsRef<str>>(args: &[S], slot_size: Option<&str>) -> Result<Self, BagError> {
        let [count] = args else {
            return Err(BagError::Usage);
        };
        let slots = parse_count(count.as_ref())?;
        let slot_capacity = match slot_size {
            Some(text) => parse_count(text)?,
            None => DEFAULT_SLOT_CAPACITY,
        };

        let config = Self::new(slots, slot_capacity, true);
        config.validate()?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            slots: 1024,
            slot_capacity: DEFAULT_SLOT_CAPACITY,
            enable_metrics: false,
        }
    }
}

/// Small footprint configuration (16 slots of one line each)
pub const SMALL_CONFIG: Config = Config::new(16, LINE_MAX, false);

/// Large burst configuration (64K slots of the default size)
pub const LARGE_CONFIG: Config = Config::new(65_536, DEFAULT_SLOT_CAPACITY, false);

/// Parses a count the way `strtol(text, NULL, 0)` reads numbers.
///
/// Leading whitespace and a `+` sign are skipped. A `0x`/`0X` prefix selects
/// hexadecimal, a leading `0` selects octal, anything else is decimal. Unlike
/// `strtol`, trailing garbage and negative values are rejected.
pub fn parse_count(text: &str) -> Result<usize, BagError> {
    let invalid = |reason: &str| BagError::Argument(format!("invalid number {text:?}: {reason}"));

    let trimmed = text.trim_start();
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if unsigned.starts_with('-') {
        return Err(invalid("must not be negative"));
    }

    let (digits, radix) = if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        (hex, 16)
    } else if unsigned.len() > 1 && unsigned.starts_with('0') {
        (&unsigned[1..], 8)
    } else {
        (unsigned, 10)
    };

    if digits.is_empty() {
        return Err(invalid("no digits"));
    }
    // from_str_radix would accept a second sign here
    if !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(invalid("unexpected character"));
    }

    usize::from_str_radix(digits, radix).map_err(|_| invalid("out of range"))
}
