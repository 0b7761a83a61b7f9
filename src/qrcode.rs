#![forbid(unsafe_code)]
//! QR symbol generation.
//!
//! Encodes payload text into a QR Code Model 2 module matrix: versions 1 to 40,
//! all four error correction levels, and the numeric, alphanumeric, and byte
//! data modes. The smallest version that fits the payload at the requested
//! level is chosen automatically, and the mask pattern is selected by the
//! standard's four penalty rules. Output is deterministic for a given
//! (payload, level, minimum version).

use serde::{Deserialize, Serialize};

use crate::error::QrError;

/// Error correction level of a QR symbol.
///
/// The ordering `Low < Medium < Quartile < High` is meaningful: logo embedding
/// escalates the level with `max`, and capacity shrinks as the level rises.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EccLevel {
    /// Tolerates ~7% erroneous codewords.
    Low,
    /// Tolerates ~15% erroneous codewords.
    Medium,
    /// Tolerates ~25% erroneous codewords.
    Quartile,
    /// Tolerates ~30% erroneous codewords.
    High,
}

impl EccLevel {
    fn ordinal(self) -> usize {
        match self {
            EccLevel::Low => 0,
            EccLevel::Medium => 1,
            EccLevel::Quartile => 2,
            EccLevel::High => 3,
        }
    }

    // 2-bit value placed in the format information.
    fn format_bits(self) -> u8 {
        match self {
            EccLevel::Low => 1,
            EccLevel::Medium => 0,
            EccLevel::Quartile => 3,
            EccLevel::High => 2,
        }
    }
}

impl core::fmt::Display for EccLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(match self {
            EccLevel::Low => "Low",
            EccLevel::Medium => "Medium",
            EccLevel::Quartile => "Quartile",
            EccLevel::High => "High",
        })
    }
}

/// A QR symbol version (1-40). Side length in modules is `4 * version + 17`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Version(u8);

impl Version {
    /// The minimum version number supported in the QR Code Model 2 standard.
    pub const MIN: Version = Version(1);

    /// The maximum version number supported in the QR Code Model 2 standard.
    pub const MAX: Version = Version(40);

    /// Creates a version object from the given number.
    ///
    /// # Panics
    ///
    /// Panics if the number is outside the range [1, 40].
    pub const fn new(ver: u8) -> Self {
        assert!(
            Version::MIN.0 <= ver && ver <= Version::MAX.0,
            "Version number out of range"
        );
        Self(ver)
    }

    /// Returns the value, which is in the range [1, 40].
    pub const fn value(self) -> u8 {
        self.0
    }
}

/// A mask pattern (0-7).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Mask(u8);

impl Mask {
    /// Creates a mask object from the given number.
    ///
    /// # Panics
    ///
    /// Panics if the number is outside the range [0, 7].
    pub const fn new(mask: u8) -> Self {
        assert!(mask <= 7, "Mask value out of range");
        Self(mask)
    }

    /// Returns the value, which is in the range [0, 7].
    pub const fn value(self) -> u8 {
        self.0
    }
}

/// A QR Code symbol: an immutable square grid of dark and light modules.
///
/// Construct with [`QrCode::encode_text`]. The matrix losslessly encodes the
/// payload at the chosen version and level; any standard-conformant reader can
/// recover it.
///
/// # Example
///
/// ```rust
/// use qrsmith::qrcode::{EccLevel, QrCode, Version};
///
/// let qr = QrCode::encode_text("Hello, World!", EccLevel::Low, Version::MIN).unwrap();
/// assert_eq!(qr.size(), 21);
/// ```
#[derive(Clone)]
pub struct QrCode {
    version: Version,
    /// Side length in modules, `4 * version + 17`, in [21, 177].
    size: i32,
    ecc: EccLevel,
    mask: Mask,
    /// Row-major module colors; `true` is dark.
    modules: Vec<bool>,
    /// Marks function modules, which masking must not touch.
    isfunction: Vec<bool>,
}

impl QrCode {
    /// Encodes a text string into a QR symbol.
    ///
    /// The most space-efficient applicable mode is chosen from the payload's
    /// character set (numeric, then alphanumeric, then byte), and the smallest
    /// version in `[min_version, 40]` whose capacity at `level` fits the data
    /// is used. The level is honored exactly as requested; escalation for logo
    /// embedding happens before this call, never after.
    ///
    /// # Errors
    ///
    /// [`QrError::PayloadTooLarge`] if no version up to 40 can hold the
    /// payload at `level`.
    pub fn encode_text(
        text: &str,
        level: EccLevel,
        min_version: Version,
    ) -> Result<QrCode, QrError> {
        let segs = QrSegment::make_segments(text);
        Self::encode_segments(&segs, level, min_version, None)
    }

    // Also takes a forced mask, which the mask-minimality test uses.
    fn encode_segments(
        segs: &[QrSegment],
        level: EccLevel,
        min_version: Version,
        mask: Option<Mask>,
    ) -> Result<QrCode, QrError> {
        // Find the minimal version number to use
        let mut version = min_version;
        let datausedbits: usize = loop {
            let datacapacitybits: usize = QrCode::num_data_codewords(version, level) * 8;
            let dataused: Option<usize> = QrSegment::total_bits(segs, version);
            match dataused {
                Some(n) if n <= datacapacitybits => break n,
                _ if version >= Version::MAX => {
                    let needed =
                        dataused.unwrap_or_else(|| segs.iter().map(|s| s.data.len() + 4).sum());
                    return Err(QrError::PayloadTooLarge {
                        data_bits: needed,
                        capacity_bits: datacapacitybits,
                    });
                }
                _ => version = Version::new(version.value() + 1),
            }
        };

        // Concatenate all segments to create the data bit string
        let mut bb = BitBuffer(Vec::new());
        for seg in segs {
            bb.append_bits(seg.mode.mode_bits(), 4);
            bb.append_bits(
                u32::try_from(seg.numchars).unwrap(),
                seg.mode.char_count_bits(version),
            );
            bb.0.extend_from_slice(&seg.data);
        }
        debug_assert_eq!(bb.0.len(), datausedbits);

        // Add terminator and pad up to a byte if applicable
        let datacapacitybits: usize = QrCode::num_data_codewords(version, level) * 8;
        let numzerobits = core::cmp::min(4, datacapacitybits - bb.0.len());
        bb.append_bits(0, u8::try_from(numzerobits).unwrap());
        let numzerobits = bb.0.len().wrapping_neg() & 7;
        bb.append_bits(0, u8::try_from(numzerobits).unwrap());
        debug_assert_eq!(bb.0.len() % 8, 0);

        // Pad with alternating bytes until data capacity is reached
        for &padbyte in [0xec_u32, 0x11].iter().cycle() {
            if bb.0.len() >= datacapacitybits {
                break;
            }
            bb.append_bits(padbyte, 8);
        }

        // Pack bits into bytes, big endian
        let mut datacodewords = vec![0u8; bb.0.len() / 8];
        for (i, &bit) in bb.0.iter().enumerate() {
            datacodewords[i >> 3] |= u8::from(bit) << (7 - (i & 7));
        }

        Ok(Self::encode_codewords(&datacodewords, level, version, mask))
    }

    // Builds the matrix for the given data codewords: function patterns, ECC
    // and interleaving, zigzag placement, then mask selection.
    fn encode_codewords(
        datacodewords: &[u8],
        level: EccLevel,
        version: Version,
        mut msk: Option<Mask>,
    ) -> QrCode {
        let size = i32::from(version.value()) * 4 + 17;
        let len = (size * size) as usize;
        let mut result = QrCode {
            version,
            size,
            ecc: level,
            mask: Mask::new(0), // placeholder until selection below
            modules: vec![false; len],
            isfunction: vec![false; len],
        };

        result.draw_function_patterns();
        let allcodewords = result.add_ecc_and_interleave(datacodewords);
        result.draw_codewords(&allcodewords);

        // Try all 8 masks and keep the one with the lowest penalty score;
        // ties break to the lowest mask index because the comparison is strict.
        if msk.is_none() {
            let mut minpenalty = i32::MAX;
            for i in 0u8..8 {
                let m = Mask::new(i);
                result.apply_mask(m);
                result.draw_format_bits(m);
                let penalty = result.penalty_score();
                if penalty < minpenalty {
                    msk = Some(m);
                    minpenalty = penalty;
                }
                result.apply_mask(m); // Undoes the mask due to XOR
            }
        }
        let msk = msk.unwrap();
        result.mask = msk;
        result.apply_mask(msk);
        result.draw_format_bits(msk);
        result
    }

    /// Returns this symbol's version, in the range [1, 40].
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the side length in modules, in the range [21, 177].
    pub fn size(&self) -> i32 {
        self.size
    }

    /// Returns the error correction level the symbol was generated at.
    pub fn error_correction_level(&self) -> EccLevel {
        self.ecc
    }

    /// Returns the applied mask pattern, in the range [0, 7].
    pub fn mask(&self) -> Mask {
        self.mask
    }

    /// Returns the color of the module at the given coordinates: `true` for
    /// dark, `false` for light. Coordinates outside the matrix return `false`,
    /// so callers can sample straight across a quiet zone.
    pub fn get_module(&self, x: i32, y: i32) -> bool {
        (0..self.size).contains(&x) && (0..self.size).contains(&y) && self.module(x, y)
    }

    fn module(&self, x: i32, y: i32) -> bool {
        self.modules[(y * self.size + x) as usize]
    }

    fn set_function_module(&mut self, x: i32, y: i32, isdark: bool) {
        let index = (y * self.size + x) as usize;
        self.modules[index] = isdark;
        self.isfunction[index] = true;
    }

    /*---- Function pattern drawing ----*/

    fn draw_function_patterns(&mut self) {
        let size = self.size;

        // Timing patterns
        for i in 0..size {
            self.set_function_module(6, i, i % 2 == 0);
            self.set_function_module(i, 6, i % 2 == 0);
        }

        // Finder patterns, overwriting some timing modules
        self.draw_finder_pattern(3, 3);
        self.draw_finder_pattern(size - 4, 3);
        self.draw_finder_pattern(3, size - 4);

        // Alignment patterns, skipping the three finder corners
        let alignpatpos = self.alignment_pattern_positions();
        let numalign = alignpatpos.len();
        for i in 0..numalign {
            for j in 0..numalign {
                if !((i == 0 && j == 0)
                    || (i == 0 && j == numalign - 1)
                    || (i == numalign - 1 && j == 0))
                {
                    self.draw_alignment_pattern(alignpatpos[i], alignpatpos[j]);
                }
            }
        }

        // Reserve the format and version areas; the real format bits are
        // drawn after mask selection.
        self.draw_format_bits(Mask::new(0));
        self.draw_version_information();
    }

    fn draw_finder_pattern(&mut self, x: i32, y: i32) {
        for dy in -4i32..=4 {
            for dx in -4i32..=4 {
                let xx = x + dx;
                let yy = y + dy;
                if (0..self.size).contains(&xx) && (0..self.size).contains(&yy) {
                    let dist = dx.abs().max(dy.abs());
                    self.set_function_module(xx, yy, dist != 2 && dist != 4);
                }
            }
        }
    }

    fn draw_alignment_pattern(&mut self, x: i32, y: i32) {
        for dy in -2i32..=2 {
            for dx in -2i32..=2 {
                self.set_function_module(x + dx, y + dy, dx.abs().max(dy.abs()) != 1);
            }
        }
    }

    fn draw_format_bits(&mut self, mask: Mask) {
        // 15 bits: 2-bit level, 3-bit mask, 10 BCH bits, XORed with 0x5412
        let bits: u32 = {
            let data = u32::from((self.ecc.format_bits() << 3) | mask.value());
            let mut rem: u32 = data;
            for _ in 0..10 {
                rem = (rem << 1) ^ ((rem >> 9) * 0x537);
            }
            ((data << 10) | rem) ^ 0x5412
        };
        debug_assert_eq!(bits >> 15, 0);

        // First copy, around the top-left finder
        for i in 0..6 {
            self.set_function_module(8, i, get_bit(bits, i as u8));
        }
        self.set_function_module(8, 7, get_bit(bits, 6));
        self.set_function_module(8, 8, get_bit(bits, 7));
        self.set_function_module(7, 8, get_bit(bits, 8));
        for i in 9..15 {
            self.set_function_module(14 - i, 8, get_bit(bits, i as u8));
        }

        // Second copy, split between the other two finders
        let size = self.size;
        for i in 0..8 {
            self.set_function_module(size - 1 - i, 8, get_bit(bits, i as u8));
        }
        for i in 8..15 {
            self.set_function_module(8, size - 15 + i, get_bit(bits, i as u8));
        }
        self.set_function_module(8, size - 8, true); // Always dark
    }

    fn draw_version_information(&mut self) {
        let ver = u32::from(self.version.value());
        if ver < 7 {
            return;
        }

        // 18 bits: 6-bit version number, 12 BCH bits
        let bits: u32 = {
            let mut rem: u32 = ver;
            for _ in 0..12 {
                rem = (rem << 1) ^ ((rem >> 11) * 0x1f25);
            }
            (ver << 12) | rem
        };
        debug_assert_eq!(bits >> 18, 0);

        // Two mirrored blocks next to the top-right and bottom-left finders
        for i in 0u8..18 {
            let bit = get_bit(bits, i);
            let a = self.size - 11 + i32::from(i % 3);
            let b = i32::from(i / 3);
            self.set_function_module(a, b, bit);
            self.set_function_module(b, a, bit);
        }
    }

    fn alignment_pattern_positions(&self) -> Vec<i32> {
        let ver = self.version.value();
        if ver == 1 {
            Vec::new()
        } else {
            let numalign = i32::from(ver) / 7 + 2;
            let step: i32 = if ver == 32 {
                26
            } else {
                (i32::from(ver) * 4 + numalign * 2 + 1) / (numalign * 2 - 2) * 2
            };
            let mut result: Vec<i32> =
                (0..numalign - 1).map(|i| self.size - 7 - i * step).collect();
            result.push(6);
            result.reverse();
            result
        }
    }

    /*---- Codewords and placement ----*/

    fn add_ecc_and_interleave(&self, data: &[u8]) -> Vec<u8> {
        let ver = self.version;
        let ecl = self.ecc;
        assert_eq!(data.len(), QrCode::num_data_codewords(ver, ecl));

        let numblocks = QrCode::table_get(&NUM_ERROR_CORRECTION_BLOCKS, ver, ecl);
        let blockecclen = QrCode::table_get(&ECC_CODEWORDS_PER_BLOCK, ver, ecl);
        let rawcodewords = QrCode::num_raw_data_modules(ver) / 8;
        let numshortblocks = numblocks - rawcodewords % numblocks;
        let shortblocklen = rawcodewords / numblocks;

        // Split into blocks, compute each block's ECC, and pad short blocks so
        // all rows line up for interleaving.
        let rs = ReedSolomonGenerator::new(blockecclen);
        let mut blocks: Vec<Vec<u8>> = Vec::with_capacity(numblocks);
        let mut k: usize = 0;
        for i in 0..numblocks {
            let datlen = shortblocklen - blockecclen + usize::from(i >= numshortblocks);
            let mut block = data[k..k + datlen].to_vec();
            k += datlen;
            let ecc = rs.compute_remainder(&block);
            if i < numshortblocks {
                block.push(0);
            }
            block.extend_from_slice(&ecc);
            blocks.push(block);
        }
        debug_assert_eq!(k, data.len());

        // Interleave column by column, skipping the padding byte of short blocks
        let mut result = Vec::with_capacity(rawcodewords);
        for i in 0..blocks[0].len() {
            for (j, block) in blocks.iter().enumerate() {
                if i != shortblocklen - blockecclen || j >= numshortblocks {
                    result.push(block[i]);
                }
            }
        }
        debug_assert_eq!(result.len(), rawcodewords);
        result
    }

    fn draw_codewords(&mut self, data: &[u8]) {
        assert_eq!(data.len(), QrCode::num_raw_data_modules(self.version) / 8);
        let size = self.size;
        let mut i: usize = 0; // Bit index into the data

        // Zigzag scan in two-column strips from the right edge, skipping the
        // vertical timing column.
        let mut right: i32 = size - 1;
        while right >= 1 {
            if right == 6 {
                right = 5;
            }
            for vert in 0..size {
                for j in 0..2 {
                    let x = right - j;
                    let upward = (right + 1) & 2 == 0;
                    let y = if upward { size - 1 - vert } else { vert };
                    let index = (y * size + x) as usize;
                    if !self.isfunction[index] && i < data.len() * 8 {
                        self.modules[index] = get_bit(data[i >> 3].into(), 7 - ((i & 7) as u8));
                        i += 1;
                    }
                }
            }
            right -= 2;
        }
        debug_assert_eq!(i, data.len() * 8);
    }

    /*---- Masking ----*/

    // XORs the mask pattern into all non-function modules. Applying the same
    // mask twice is a no-op.
    fn apply_mask(&mut self, mask: Mask) {
        for y in 0..self.size {
            for x in 0..self.size {
                let index = (y * self.size + x) as usize;
                if self.isfunction[index] {
                    continue;
                }
                let invert = match mask.value() {
                    0 => (x + y) % 2 == 0,
                    1 => y % 2 == 0,
                    2 => x % 3 == 0,
                    3 => (x + y) % 3 == 0,
                    4 => (x / 3 + y / 2) % 2 == 0,
                    5 => ((x * y) % 2) + ((x * y) % 3) == 0,
                    6 => (((x * y) % 2) + ((x * y) % 3)) % 2 == 0,
                    7 => (((x + y) % 2) + ((x * y) % 3)) % 2 == 0,
                    _ => unreachable!(),
                };
                self.modules[index] ^= invert;
            }
        }
    }

    // The standard's four penalty rules: runs of one color, 2x2 blocks,
    // finder-like patterns, and dark/light balance.
    fn penalty_score(&self) -> i32 {
        let mut result: i32 = 0;
        let size = self.size;

        // Rules 1 and 3, rows
        for y in 0..size {
            let mut runcolor = false;
            let mut runx: i32 = 0;
            let mut runhistory = FinderPenalty::new(size);
            for x in 0..size {
                if self.module(x, y) == runcolor {
                    runx += 1;
                    if runx == 5 {
                        result += PENALTY_N1;
                    } else if runx > 5 {
                        result += 1;
                    }
                } else {
                    runhistory.add_history(runx);
                    if !runcolor {
                        result += runhistory.count_patterns() * PENALTY_N3;
                    }
                    runcolor = self.module(x, y);
                    runx = 1;
                }
            }
            result += runhistory.terminate_and_count(runcolor, runx) * PENALTY_N3;
        }

        // Rules 1 and 3, columns
        for x in 0..size {
            let mut runcolor = false;
            let mut runy: i32 = 0;
            let mut runhistory = FinderPenalty::new(size);
            for y in 0..size {
                if self.module(x, y) == runcolor {
                    runy += 1;
                    if runy == 5 {
                        result += PENALTY_N1;
                    } else if runy > 5 {
                        result += 1;
                    }
                } else {
                    runhistory.add_history(runy);
                    if !runcolor {
                        result += runhistory.count_patterns() * PENALTY_N3;
                    }
                    runcolor = self.module(x, y);
                    runy = 1;
                }
            }
            result += runhistory.terminate_and_count(runcolor, runy) * PENALTY_N3;
        }

        // Rule 2: 2x2 blocks of the same color
        for y in 0..size - 1 {
            for x in 0..size - 1 {
                let color = self.module(x, y);
                if color == self.module(x + 1, y)
                    && color == self.module(x, y + 1)
                    && color == self.module(x + 1, y + 1)
                {
                    result += PENALTY_N2;
                }
            }
        }

        // Rule 4: dark/light balance, one unit per 5% step away from 50%
        let dark = self.modules.iter().filter(|&&b| b).count() as i32;
        let total = size * size;
        let k = ((dark * 20 - total * 10).abs() + total - 1) / total - 1;
        result += k * PENALTY_N4;
        result
    }

    /*---- Capacity tables ----*/

    fn num_raw_data_modules(ver: Version) -> usize {
        let ver = usize::from(ver.value());
        let mut result: usize = (16 * ver + 128) * ver + 64;
        if ver >= 2 {
            let numalign: usize = ver / 7 + 2;
            result -= (25 * numalign - 10) * numalign - 55;
            if ver >= 7 {
                result -= 36;
            }
        }
        result
    }

    fn num_data_codewords(ver: Version, ecl: EccLevel) -> usize {
        QrCode::num_raw_data_modules(ver) / 8
            - QrCode::table_get(&ECC_CODEWORDS_PER_BLOCK, ver, ecl)
                * QrCode::table_get(&NUM_ERROR_CORRECTION_BLOCKS, ver, ecl)
    }

    fn table_get(table: &'static [[i8; 41]; 4], ver: Version, ecl: EccLevel) -> usize {
        table[ecl.ordinal()][usize::from(ver.value())] as usize
    }
}

impl PartialEq for QrCode {
    fn eq(&self, other: &QrCode) -> bool {
        self.size == other.size && self.modules == other.modules
    }
}

impl Eq for QrCode {}

impl core::fmt::Debug for QrCode {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("QrCode")
            .field("version", &self.version.value())
            .field("size", &self.size)
            .field("ecc", &self.ecc)
            .field("mask", &self.mask.value())
            .finish_non_exhaustive()
    }
}

/*---- Reed-Solomon over GF(2^8), reducing polynomial 0x11D ----*/

struct ReedSolomonGenerator {
    divisor: Vec<u8>,
}

impl ReedSolomonGenerator {
    fn new(degree: usize) -> Self {
        assert!((1..=30).contains(&degree), "Degree out of range");
        // Product (x - r^0)(x - r^1)...(x - r^{degree-1}), stored without the
        // leading monic term
        let mut divisor = vec![0u8; degree];
        divisor[degree - 1] = 1;
        let mut root: u8 = 1;
        for _ in 0..degree {
            for j in 0..degree {
                divisor[j] = Self::multiply(divisor[j], root);
                if j + 1 < degree {
                    divisor[j] ^= divisor[j + 1];
                }
            }
            root = Self::multiply(root, 0x02);
        }
        Self { divisor }
    }

    fn compute_remainder(&self, data: &[u8]) -> Vec<u8> {
        let mut result = vec![0u8; self.divisor.len()];
        for &b in data {
            // Polynomial division one byte at a time
            let factor = b ^ result[0];
            result.copy_within(1.., 0);
            let last = result.len() - 1;
            result[last] = 0;
            for (x, &y) in result.iter_mut().zip(self.divisor.iter()) {
                *x ^= Self::multiply(y, factor);
            }
        }
        result
    }

    fn multiply(x: u8, y: u8) -> u8 {
        // Russian peasant multiplication
        let mut z: u8 = 0;
        for i in (0..8).rev() {
            z = (z << 1) ^ ((z >> 7) * 0x1d);
            z ^= ((y >> i) & 1) * x;
        }
        z
    }
}

/*---- Finder-like pattern detection for penalty rule 3 ----*/

struct FinderPenalty {
    qr_size: i32,
    run_history: [i32; 7],
}

impl FinderPenalty {
    fn new(size: i32) -> Self {
        Self {
            qr_size: size,
            run_history: [0; 7],
        }
    }

    fn add_history(&mut self, mut currentrunlength: i32) {
        if self.run_history[0] == 0 {
            currentrunlength += self.qr_size; // Add light border to initial run
        }
        let len = self.run_history.len();
        self.run_history.copy_within(0..len - 1, 1);
        self.run_history[0] = currentrunlength;
    }

    // Counts 1:1:3:1:1 dark patterns with a 4-wide light flank
    fn count_patterns(&self) -> i32 {
        let rh = &self.run_history;
        let n = rh[1];
        i32::from(
            n > 0
                && rh[2] == n
                && rh[3] == n * 3
                && rh[4] == n
                && rh[5] == n
                && (rh[0] >= n * 4 || rh[6] >= n * 4),
        )
    }

    fn terminate_and_count(mut self, currentruncolor: bool, mut currentrunlength: i32) -> i32 {
        if currentruncolor {
            self.add_history(currentrunlength);
            currentrunlength = 0;
        }
        currentrunlength += self.qr_size; // Add light border to final run
        self.add_history(currentrunlength);
        self.count_patterns()
    }
}

const PENALTY_N1: i32 = 3;
const PENALTY_N2: i32 = 3;
const PENALTY_N3: i32 = 40;
const PENALTY_N4: i32 = 10;

static ECC_CODEWORDS_PER_BLOCK: [[i8; 41]; 4] = [
    [
        -1, 7, 10, 15, 20, 26, 18, 20, 24, 30, 18, 20, 24, 26, 30, 22, 24, 28, 30, 28, 28, 28, 28, 30,
        30, 26, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ], // Low
    [
        -1, 10, 16, 26, 18, 24, 16, 18, 22, 22, 26, 30, 22, 22, 24, 24, 28, 28, 26, 26, 26, 26, 28, 28,
        28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28,
    ], // Medium
    [
        -1, 13, 22, 18, 26, 18, 24, 18, 22, 20, 24, 28, 26, 24, 20, 30, 24, 28, 28, 26, 30, 28, 30, 30,
        30, 30, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ], // Quartile
    [
        -1, 17, 28, 22, 16, 22, 28, 26, 26, 24, 28, 24, 28, 22, 24, 24, 30, 28, 28, 26, 28, 30, 24, 30,
        30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ], // High
];

static NUM_ERROR_CORRECTION_BLOCKS: [[i8; 41]; 4] = [
    [
        -1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 4, 4, 4, 4, 4, 6, 6, 6, 6, 7, 8, 8, 9, 9, 10, 12, 12, 12,
        13, 14, 15, 16, 17, 18, 19, 19, 20, 21, 22, 24, 25,
    ], // Low
    [
        -1, 1, 1, 1, 2, 2, 4, 4, 4, 5, 5, 5, 8, 9, 9, 10, 10, 11, 13, 14, 16, 17, 17, 18, 20, 21,
        23, 25, 26, 28, 29, 31, 33, 35, 37, 38, 40, 43, 45, 47, 49,
    ], // Medium
    [
        -1, 1, 1, 2, 2, 4, 4, 6, 6, 8, 8, 8, 10, 12, 16, 12, 17, 16, 18, 21, 20, 23, 23, 25, 27, 29,
        34, 34, 35, 38, 40, 43, 45, 48, 51, 53, 56, 59, 62, 65, 68,
    ], // Quartile
    [
        -1, 1, 1, 2, 4, 4, 4, 5, 6, 8, 8, 11, 11, 16, 16, 18, 16, 19, 21, 25, 25, 25, 34, 30, 32, 35,
        37, 40, 42, 45, 48, 51, 54, 57, 60, 63, 66, 70, 74, 77, 81,
    ], // High
];

/*---- Data segments ----*/

/// A segment of payload data in one of the three supported encoding modes.
///
/// Segments are immutable once created; [`QrSegment::make_segments`] picks the
/// densest mode the payload's character set permits.
pub struct QrSegment {
    mode: SegmentMode,
    numchars: usize,
    data: Vec<bool>,
}

impl QrSegment {
    /// Splits a payload into segments, choosing the most space-efficient mode
    /// for the whole string: numeric, then alphanumeric, then byte.
    pub fn make_segments(text: &str) -> Vec<QrSegment> {
        if text.is_empty() {
            Vec::new()
        } else if Self::is_numeric(text) {
            vec![Self::make_numeric(text)]
        } else if Self::is_alphanumeric(text) {
            vec![Self::make_alphanumeric(text)]
        } else {
            vec![Self::make_bytes(text.as_bytes())]
        }
    }

    /// Creates a segment for binary data in byte mode.
    pub fn make_bytes(data: &[u8]) -> Self {
        let mut bb = BitBuffer(Vec::with_capacity(data.len() * 8));
        for &b in data {
            bb.append_bits(b.into(), 8);
        }
        QrSegment::new(SegmentMode::Byte, data.len(), bb.0)
    }

    /// Creates a segment for a string of decimal digits in numeric mode.
    ///
    /// # Panics
    ///
    /// Panics if `text` contains non-digit characters.
    pub fn make_numeric(text: &str) -> Self {
        let mut bb = BitBuffer(Vec::new());
        let mut accumdata: u32 = 0;
        let mut accumcount: u8 = 0;
        for b in text.bytes() {
            assert!(b.is_ascii_digit(), "String contains non-numeric characters");
            accumdata = accumdata * 10 + u32::from(b - b'0');
            accumcount += 1;
            if accumcount == 3 {
                bb.append_bits(accumdata, 10);
                accumdata = 0;
                accumcount = 0;
            }
        }
        if accumcount > 0 {
            bb.append_bits(accumdata, accumcount * 3 + 1);
        }
        QrSegment::new(SegmentMode::Numeric, text.len(), bb.0)
    }

    /// Creates a segment for alphanumeric text.
    ///
    /// Allowed characters: 0-9, A-Z (uppercase), space, `$`, `%`, `*`, `+`,
    /// `-`, `.`, `/`, `:`.
    ///
    /// # Panics
    ///
    /// Panics if `text` contains characters outside that set.
    pub fn make_alphanumeric(text: &str) -> Self {
        let mut bb = BitBuffer(Vec::new());
        let mut accumdata: u32 = 0;
        let mut accumcount: u8 = 0;
        for c in text.chars() {
            let i = ALPHANUMERIC_CHARSET
                .find(c)
                .expect("String contains unencodable characters in alphanumeric mode");
            accumdata = accumdata * 45 + u32::try_from(i).unwrap();
            accumcount += 1;
            if accumcount == 2 {
                bb.append_bits(accumdata, 11);
                accumdata = 0;
                accumcount = 0;
            }
        }
        if accumcount > 0 {
            bb.append_bits(accumdata, 6);
        }
        QrSegment::new(SegmentMode::Alphanumeric, text.len(), bb.0)
    }

    fn new(mode: SegmentMode, numchars: usize, data: Vec<bool>) -> Self {
        Self {
            mode,
            numchars,
            data,
        }
    }

    /// Returns the segment's encoding mode.
    pub fn mode(&self) -> SegmentMode {
        self.mode
    }

    /// Returns the number of source characters the segment encodes.
    pub fn num_chars(&self) -> usize {
        self.numchars
    }

    // Total bit length of the segments at the given version, or None if a
    // segment's character count overflows its count field.
    fn total_bits(segs: &[Self], version: Version) -> Option<usize> {
        let mut result: usize = 0;
        for seg in segs {
            let ccbits = seg.mode.char_count_bits(version);
            if let Some(limit) = 1usize.checked_shl(ccbits.into()) {
                if seg.numchars >= limit {
                    return None;
                }
            }
            result = result.checked_add(4 + usize::from(ccbits))?;
            result = result.checked_add(seg.data.len())?;
        }
        Some(result)
    }

    /// Tests whether the string consists solely of decimal digits.
    pub fn is_numeric(text: &str) -> bool {
        text.chars().all(|c| c.is_ascii_digit())
    }

    /// Tests whether the string can be encoded in alphanumeric mode.
    pub fn is_alphanumeric(text: &str) -> bool {
        text.chars().all(|c| ALPHANUMERIC_CHARSET.contains(c))
    }
}

static ALPHANUMERIC_CHARSET: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:";

/// Encoding mode of a data segment.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SegmentMode {
    Numeric,
    Alphanumeric,
    Byte,
}

impl SegmentMode {
    fn mode_bits(self) -> u32 {
        match self {
            SegmentMode::Numeric => 0x1,
            SegmentMode::Alphanumeric => 0x2,
            SegmentMode::Byte => 0x4,
        }
    }

    // Width of the character count field, by version band
    fn char_count_bits(self, ver: Version) -> u8 {
        (match self {
            SegmentMode::Numeric => [10, 12, 14],
            SegmentMode::Alphanumeric => [9, 11, 13],
            SegmentMode::Byte => [8, 16, 16],
        })[usize::from((ver.value() + 7) / 17)]
    }
}

struct BitBuffer(Vec<bool>);

impl BitBuffer {
    fn append_bits(&mut self, val: u32, len: u8) {
        assert!(len <= 31 && (val >> len) == 0);
        self.0.extend((0..len).rev().map(|i| get_bit(val, i)));
    }
}

fn get_bit(x: u32, i: u8) -> bool {
    ((x >> i) & 1) != 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_is_numeric() {
        assert_eq!(QrSegment::is_numeric("1234567890"), true);
        assert_eq!(QrSegment::is_numeric("1234abc"), false);
    }

    #[test]
    fn test_is_alphanumeric() {
        assert_eq!(QrSegment::is_alphanumeric("HELLO WORLD"), true);
        assert_eq!(QrSegment::is_alphanumeric("Hello World"), false);
    }

    #[test]
    fn short_byte_payload_fits_version_one() {
        let qr = QrCode::encode_text("Hello, world!", EccLevel::Low, Version::MIN).unwrap();
        assert_eq!(qr.version().value(), 1);
        assert_eq!(qr.size(), 21);
        assert_eq!(qr.error_correction_level(), EccLevel::Low);
    }

    #[test]
    fn min_version_is_honored() {
        let qr = QrCode::encode_text("Hello", EccLevel::Low, Version::new(5)).unwrap();
        assert_eq!(qr.version().value(), 5);
        assert_eq!(qr.size(), 4 * 5 + 17);
    }

    #[test]
    fn identical_inputs_yield_identical_matrices() {
        let a =
            QrCode::encode_text("WIFI:T:WPA;S:Cafe;P:secret;;", EccLevel::Quartile, Version::MIN)
                .unwrap();
        let b =
            QrCode::encode_text("WIFI:T:WPA;S:Cafe;P:secret;;", EccLevel::Quartile, Version::MIN)
                .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.mask(), b.mask());
    }

    #[test]
    fn required_version_grows_monotonically_with_level() {
        let payload = "https://example.com/some/fairly/long/path?with=query&and=more";
        let levels = [
            EccLevel::Low,
            EccLevel::Medium,
            EccLevel::Quartile,
            EccLevel::High,
        ];
        let versions: Vec<u8> = levels
            .iter()
            .map(|&lvl| {
                QrCode::encode_text(payload, lvl, Version::MIN)
                    .unwrap()
                    .version()
                    .value()
            })
            .collect();
        for pair in versions.windows(2) {
            assert!(pair[0] <= pair[1], "versions not monotonic: {versions:?}");
        }
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let payload = "x".repeat(3000); // Above byte capacity of version 40-L
        let err = QrCode::encode_text(&payload, EccLevel::Low, Version::MIN).unwrap_err();
        assert!(matches!(err, QrError::PayloadTooLarge { .. }));
    }

    #[test]
    fn chosen_mask_minimizes_penalty() {
        let segs = QrSegment::make_segments("HELLO WORLD 123");
        let auto = QrCode::encode_segments(&segs, EccLevel::Medium, Version::MIN, None).unwrap();

        // Independent check: score every forced mask and take the argmin,
        // ties to the lowest index.
        let mut best_mask = 0u8;
        let mut best_penalty = i32::MAX;
        for i in 0u8..8 {
            let forced =
                QrCode::encode_segments(&segs, EccLevel::Medium, Version::MIN, Some(Mask::new(i)))
                    .unwrap();
            let penalty = forced.penalty_score();
            if penalty < best_penalty {
                best_mask = i;
                best_penalty = penalty;
            }
        }
        assert_eq!(auto.mask().value(), best_mask);
    }

    #[test]
    fn numeric_mode_packs_denser_than_byte() {
        // 41 digits exceed version 1 byte capacity but fit in numeric mode
        let digits = "12345678901234567890123456789012345678901";
        let qr = QrCode::encode_text(digits, EccLevel::Low, Version::MIN).unwrap();
        assert_eq!(qr.version().value(), 1);
    }

    #[test]
    fn alignment_positions_match_known_versions() {
        let v2 = QrCode::encode_text("x", EccLevel::Low, Version::new(2)).unwrap();
        assert_eq!(v2.alignment_pattern_positions(), vec![6, 18]);
        let v7 = QrCode::encode_text("x", EccLevel::Low, Version::new(7)).unwrap();
        assert_eq!(v7.alignment_pattern_positions(), vec![6, 22, 38]);
    }

    proptest! {
        #[test]
        fn encoding_is_deterministic(text in "[ -~]{1,120}") {
            let a = QrCode::encode_text(&text, EccLevel::Medium, Version::MIN).unwrap();
            let b = QrCode::encode_text(&text, EccLevel::Medium, Version::MIN).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
