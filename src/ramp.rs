//! Ramp waveform generation.
//!
//! One period of the ramp is a staircase that rises from code 0 to the maximum
//! code over all samples but the last one, and a final sample that goes back
//! to 0. Codes are placed in the high-order bits of each 32-bit word, which is
//! the sample alignment expected by the DAC datapath downstream of the FIFO.

use anyhow::Result;

/// Number of bytes in a sample word.
pub const WORD_BYTES: usize = std::mem::size_of::<u32>();

/// Default number of samples in a period.
pub const DEFAULT_NUM_SAMPLES: usize = 256;

/// Default maximum code (14-bit DAC).
pub const DEFAULT_MAX_CODE: u32 = (1 << 14) - 1;

/// Default code alignment: bits 31:18.
pub const DEFAULT_SHIFT: u32 = 18;

/// Position of the sample code inside a word.
///
/// The code occupies bits `31:shift`. The bits below `shift` are always zero.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SampleField {
    shift: u32,
}

impl SampleField {
    /// Creates a field whose least significant bit is `shift`.
    pub fn new(shift: u32) -> Result<SampleField> {
        if shift >= u32::BITS {
            anyhow::bail!("sample field shift {shift} leaves no room for the code");
        }
        Ok(SampleField { shift })
    }

    /// Bit position of the least significant code bit.
    pub fn shift(&self) -> u32 {
        self.shift
    }

    /// Largest code that fits in the field.
    pub fn max_code(&self) -> u32 {
        u32::MAX >> self.shift
    }

    /// Places `code` in the field.
    pub fn pack(&self, code: u32) -> u32 {
        code << self.shift
    }

    /// Extracts the code from a word.
    pub fn unpack(&self, word: u32) -> u32 {
        word >> self.shift
    }

    /// Bits of the word below the field.
    pub fn low_bits(&self, word: u32) -> u32 {
        word & !(u32::MAX << self.shift)
    }
}

impl Default for SampleField {
    fn default() -> SampleField {
        SampleField {
            shift: DEFAULT_SHIFT,
        }
    }
}

/// Ramp parameters.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct RampConfig {
    num_samples: usize,
    max_code: u32,
    field: SampleField,
}

impl RampConfig {
    /// Creates a ramp configuration.
    ///
    /// Fails if there are fewer than 2 samples, if `max_code` is 0 or does not
    /// fit in `field`, or if a frame of `num_samples` words is longer than
    /// what the FIFO length register can describe.
    pub fn new(num_samples: usize, max_code: u32, field: SampleField) -> Result<RampConfig> {
        if num_samples < 2 {
            anyhow::bail!("a ramp needs at least 2 samples, got {num_samples}");
        }
        if max_code == 0 {
            anyhow::bail!("maximum code must be positive");
        }
        if max_code > field.max_code() {
            anyhow::bail!(
                "maximum code {max_code} does not fit in bits 31:{} (max {})",
                field.shift(),
                field.max_code()
            );
        }
        if num_samples
            .checked_mul(WORD_BYTES)
            .and_then(|bytes| u32::try_from(bytes).ok())
            .is_none()
        {
            anyhow::bail!("{num_samples} samples do not fit in a single frame");
        }
        Ok(RampConfig {
            num_samples,
            max_code,
            field,
        })
    }

    /// Number of samples in a period.
    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// Code reached at the top of the ramp.
    pub fn max_code(&self) -> u32 {
        self.max_code
    }

    /// Alignment of the codes in the words.
    pub fn field(&self) -> SampleField {
        self.field
    }

    /// Code of ramp sample `i`, for `i` in `0..=num_samples - 2`.
    ///
    /// This is `i * max_code / (num_samples - 2)` rounded half up and
    /// saturated to `max_code`. With 2 samples there is no step and the code
    /// is 0.
    fn code(&self, i: usize) -> u32 {
        let steps = (self.num_samples - 2) as u64;
        if steps == 0 {
            return 0;
        }
        let num = 2 * i as u64 * u64::from(self.max_code) + steps;
        let code = num / (2 * steps);
        // saturating, so the conversion cannot fail
        u32::try_from(code.min(u64::from(self.max_code))).unwrap_or(self.max_code)
    }
}

impl Default for RampConfig {
    fn default() -> RampConfig {
        RampConfig {
            num_samples: DEFAULT_NUM_SAMPLES,
            max_code: DEFAULT_MAX_CODE,
            field: SampleField::default(),
        }
    }
}

/// One period of the output waveform, as FIFO words.
///
/// The contents are fixed once generated.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Waveform {
    words: Box<[u32]>,
    field: SampleField,
}

impl Waveform {
    /// Generates one ramp period.
    pub fn ramp(config: &RampConfig) -> Waveform {
        let n = config.num_samples();
        let words = (0..n)
            .map(|i| {
                if i == n - 1 {
                    0
                } else {
                    config.field().pack(config.code(i))
                }
            })
            .collect();
        Waveform {
            words,
            field: config.field(),
        }
    }

    /// Sample words, in transmission order.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Returns `true` if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Unshifted code of sample `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of range.
    pub fn code(&self, i: usize) -> u32 {
        self.field.unpack(self.words[i])
    }

    /// Length in bytes of a frame carrying the whole period.
    pub fn frame_length_bytes(&self) -> usize {
        self.words.len() * WORD_BYTES
    }
}
