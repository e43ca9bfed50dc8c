//! Run configuration: alignment mode, score precision, DP block geometry
//! and scoring constants.

/// Width of the (conceptual) SIMD register the lane engines model, in bits.
pub const SIMD_REG_BITS: usize = 512;

/// Padding character stored in unused SoA lanes; never matches a real label.
pub const DUMMY: u8 = b'B';

// Default scoring constants (linear edit costs, all non-negative)
pub const MATCH_SCORE: i32 = 1;
pub const MISMATCH_PENALTY: i32 = 1;
pub const INS_PENALTY: i32 = 1;
pub const DEL_PENALTY: i32 = 1;

// Default DP block geometry (both must be powers of two)
pub const BLOCK_WIDTH: usize = 8;
pub const BLOCK_HEIGHT: usize = 16;

/// Alignment mode. Only local (Smith-Waterman style) alignment is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlignMode {
    #[default]
    Local,
}

/// Integer width used for DP scores. Narrower types pack more lanes into a
/// register but bound the representable score range; see
/// [`ScorePrecision::max_score`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScorePrecision {
    Int8,
    #[default]
    Int16,
    Int32,
}

impl ScorePrecision {
    pub fn bits(self) -> u32 {
        match self {
            ScorePrecision::Int8 => 8,
            ScorePrecision::Int16 => 16,
            ScorePrecision::Int32 => 32,
        }
    }

    /// SIMD lane count for this precision in a 512-bit register.
    pub fn lanes(self) -> usize {
        SIMD_REG_BITS / self.bits() as usize
    }

    /// Largest score the precision can represent.
    pub fn max_score(self) -> i64 {
        match self {
            ScorePrecision::Int8 => i8::MAX as i64,
            ScorePrecision::Int16 => i16::MAX as i64,
            ScorePrecision::Int32 => i32::MAX as i64,
        }
    }

    pub fn parse(bits: u32) -> Result<Self, String> {
        match bits {
            8 => Ok(ScorePrecision::Int8),
            16 => Ok(ScorePrecision::Int16),
            32 => Ok(ScorePrecision::Int32),
            other => Err(format!("unsupported score precision: {} bits", other)),
        }
    }
}

/// Linear edit costs. `match_score` is a reward; the penalties are stored as
/// non-negative magnitudes and subtracted by the recurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scoring {
    pub match_score: i32,
    pub mismatch: i32,
    pub ins: i32,
    pub del: i32,
}

impl Default for Scoring {
    fn default() -> Self {
        Scoring {
            match_score: MATCH_SCORE,
            mismatch: MISMATCH_PENALTY,
            ins: INS_PENALTY,
            del: DEL_PENALTY,
        }
    }
}

impl Scoring {
    pub fn validate(&self) -> Result<(), String> {
        if self.match_score <= 0 {
            return Err("match score must be positive".to_string());
        }
        // zero-cost edits would let padded sentinel rows replicate real
        // scores, and phase 2 divides by the deletion cost
        if self.mismatch <= 0 || self.ins <= 0 || self.del <= 0 {
            return Err("penalties must be positive".to_string());
        }
        Ok(())
    }
}

/// Full configuration for one alignment run.
#[derive(Debug, Clone)]
pub struct AlignConfig {
    pub mode: AlignMode,
    pub precision: ScorePrecision,
    pub block_width: usize,
    pub block_height: usize,
    pub scoring: Scoring,
}

impl Default for AlignConfig {
    fn default() -> Self {
        AlignConfig {
            mode: AlignMode::Local,
            precision: ScorePrecision::default(),
            block_width: BLOCK_WIDTH,
            block_height: BLOCK_HEIGHT,
            scoring: Scoring::default(),
        }
    }
}

impl AlignConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.block_width.is_power_of_two() {
            return Err(format!(
                "block width {} is not a power of two",
                self.block_width
            ));
        }
        if !self.block_height.is_power_of_two() {
            return Err(format!(
                "block height {} is not a power of two",
                self.block_height
            ));
        }
        self.scoring.validate()?;
        Ok(())
    }
}
