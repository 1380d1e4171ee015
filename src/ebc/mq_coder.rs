//! MQ binary arithmetic coder.
//!
//! Interval register `A` renormalizes into `[0x8000, 0x10000)`; the code
//! register `C` carries 28 significant bits. Bytes are emitted through a
//! one-byte delay so a carry can still propagate into the pending byte, and
//! a byte of 0xFF is followed by a 7-bit byte (bit stuffing). The decoder
//! runs the inverted-byte software convention and feeds 0xFF once the input
//! slice is exhausted, so it consumes exactly the bytes the encoder emitted.
//!
//! The probability state machine is shared: 47 `(Qe, NMPS, NLPS, SWITCH)`
//! entries, with each context owning a mutable `(state index, MPS)` pair.

#[derive(Clone, Copy)]
struct QeEntry {
    qe: u16,
    nmps: u8,
    nlps: u8,
    switch: bool,
}

macro_rules! qe {
    ($($qe:expr, $nmps:expr, $nlps:expr, $switch:expr),+ $(,)?) => {
        [ $( QeEntry { qe: $qe, nmps: $nmps, nlps: $nlps, switch: $switch } ),+ ]
    };
}

#[rustfmt::skip]
const QE_TABLE: [QeEntry; 47] = qe!(
    0x5601,  1,  1, true,
    0x3401,  2,  6, false,
    0x1801,  3,  9, false,
    0x0AC1,  4, 12, false,
    0x0521,  5, 29, false,
    0x0221, 38, 33, false,
    0x5601,  7,  6, true,
    0x5401,  8, 14, false,
    0x4801,  9, 14, false,
    0x3801, 10, 14, false,
    0x3001, 11, 17, false,
    0x2401, 12, 18, false,
    0x1C01, 13, 20, false,
    0x1601, 29, 21, false,
    0x5601, 15, 14, true,
    0x5401, 16, 14, false,
    0x5101, 17, 15, false,
    0x4801, 18, 16, false,
    0x3801, 19, 17, false,
    0x3401, 20, 18, false,
    0x3001, 21, 19, false,
    0x2801, 22, 19, false,
    0x2401, 23, 20, false,
    0x2201, 24, 21, false,
    0x1C01, 25, 22, false,
    0x1801, 26, 23, false,
    0x1601, 27, 24, false,
    0x1401, 28, 25, false,
    0x1201, 29, 26, false,
    0x1101, 30, 27, false,
    0x0AC1, 31, 28, false,
    0x09C1, 32, 29, false,
    0x08A1, 33, 30, false,
    0x0521, 34, 31, false,
    0x0441, 35, 32, false,
    0x02A1, 36, 33, false,
    0x0221, 37, 34, false,
    0x0141, 38, 35, false,
    0x0111, 39, 36, false,
    0x0085, 40, 37, false,
    0x0049, 41, 38, false,
    0x0025, 42, 39, false,
    0x0015, 43, 40, false,
    0x0009, 44, 41, false,
    0x0005, 45, 42, false,
    0x0001, 46, 43, false,
    0x5601, 46, 46, false,
);

/// Adaptive state of one context: table index plus the current MPS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextState {
    pub index: u8,
    pub mps: u8,
}

impl ContextState {
    pub fn new(index: u8, mps: u8) -> Self {
        Self { index, mps }
    }
}

pub struct MqEncoder {
    a: u16,
    c: u32,
    ct: u8,
    /// Pending byte, emitted one byte_out late so carries can reach it.
    b: u8,
    /// The pending byte before the first byte_out is a placeholder and is
    /// never emitted.
    started: bool,
    data: Vec<u8>,
}

impl MqEncoder {
    pub fn new() -> Self {
        Self {
            a: 0x8000,
            c: 0,
            ct: 12,
            b: 0,
            started: false,
            data: Vec::new(),
        }
    }

    /// Encode one `(symbol, context)` pair.
    pub fn encode(&mut self, bit: u8, cx: &mut ContextState) {
        let entry = &QE_TABLE[cx.index as usize];
        let qe = entry.qe;
        self.a -= qe;

        if bit == cx.mps {
            if self.a & 0x8000 != 0 {
                self.c += qe as u32;
            } else {
                if self.a < qe {
                    // conditional exchange: MPS keeps the smaller interval
                    self.a = qe;
                } else {
                    self.c += qe as u32;
                }
                cx.index = entry.nmps;
                self.renormalize();
            }
        } else {
            if self.a < qe {
                self.c += qe as u32;
            } else {
                self.a = qe;
            }
            if entry.switch {
                cx.mps = 1 - cx.mps;
            }
            cx.index = entry.nlps;
            self.renormalize();
        }
    }

    fn renormalize(&mut self) {
        loop {
            self.a <<= 1;
            self.c <<= 1;
            self.ct -= 1;
            if self.ct == 0 {
                self.byte_out();
            }
            if self.a & 0x8000 != 0 {
                break;
            }
        }
    }

    fn byte_out(&mut self) {
        if self.b == 0xFF {
            self.emit(20);
        } else if self.c < 0x0800_0000 {
            self.emit(19);
        } else {
            // propagate the carry into the pending byte
            self.b = self.b.wrapping_add(1);
            if self.b == 0xFF {
                self.c &= 0x07FF_FFFF;
                self.emit(20);
            } else {
                self.emit(19);
            }
        }
    }

    /// Push the pending byte and latch the next one from `C`. A shift of 20
    /// leaves 7 data bits (after a 0xFF), a shift of 19 the full 8.
    fn emit(&mut self, shift: u8) {
        if self.started {
            self.data.push(self.b);
        }
        self.started = true;
        self.b = (self.c >> shift) as u8;
        self.c &= (1 << shift) - 1;
        self.ct = if shift == 20 { 7 } else { 8 };
    }

    /// Terminate the stream: set the remaining code bits, drain the
    /// registers and the pending byte.
    pub fn finish(mut self) -> Vec<u8> {
        let upper = self.c + self.a as u32;
        self.c |= 0xFFFF;
        if self.c >= upper {
            self.c -= 0x8000;
        }
        self.c <<= self.ct;
        self.byte_out();
        self.c <<= self.ct;
        self.byte_out();
        if self.started {
            self.data.push(self.b);
        }
        self.data
    }
}

impl Default for MqEncoder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MqDecoder<'a> {
    data: &'a [u8],
    a: u16,
    c: u32,
    ct: u8,
    bp: usize,
}

impl<'a> MqDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        let mut decoder = Self {
            data,
            a: 0,
            c: 0,
            ct: 0,
            bp: 0,
        };
        decoder.c = ((decoder.b() as u32) ^ 0xFF) << 16;
        decoder.byte_in();
        decoder.c <<= 7;
        decoder.ct -= 7;
        decoder.a = 0x8000;
        decoder
    }

    /// Current byte; past the end of the block the stream behaves as an
    /// endless run of 0xFF.
    fn b(&self) -> u8 {
        self.data.get(self.bp).copied().unwrap_or(0xFF)
    }

    fn b1(&self) -> u8 {
        self.data.get(self.bp + 1).copied().unwrap_or(0xFF)
    }

    fn byte_in(&mut self) {
        if self.b() == 0xFF {
            if self.b1() > 0x8F {
                self.ct = 8;
            } else {
                self.bp += 1;
                self.c += 0xFE00 - ((self.b() as u32) << 9);
                self.ct = 7;
            }
        } else {
            self.bp += 1;
            self.c += 0xFF00 - ((self.b() as u32) << 8);
            self.ct = 8;
        }
    }

    fn renormalize(&mut self) {
        loop {
            if self.ct == 0 {
                self.byte_in();
            }
            self.a <<= 1;
            self.c <<= 1;
            self.ct -= 1;
            if self.a & 0x8000 != 0 {
                break;
            }
        }
    }

    /// Decode one symbol under the given context.
    pub fn decode(&mut self, cx: &mut ContextState) -> u8 {
        let qe = QE_TABLE[cx.index as usize].qe;
        self.a -= qe;

        if (self.c >> 16) < self.a as u32 {
            if self.a & 0x8000 != 0 {
                cx.mps
            } else {
                let d = self.mps_exchange(cx);
                self.renormalize();
                d
            }
        } else {
            let chigh = (self.c >> 16) - self.a as u32;
            self.c = (chigh << 16) | (self.c & 0xFFFF);
            let d = self.lps_exchange(cx);
            self.renormalize();
            d
        }
    }

    fn mps_exchange(&mut self, cx: &mut ContextState) -> u8 {
        let entry = &QE_TABLE[cx.index as usize];
        if self.a < entry.qe {
            let d = 1 - cx.mps;
            if entry.switch {
                cx.mps = 1 - cx.mps;
            }
            cx.index = entry.nlps;
            d
        } else {
            let d = cx.mps;
            cx.index = entry.nmps;
            d
        }
    }

    fn lps_exchange(&mut self, cx: &mut ContextState) -> u8 {
        let entry = &QE_TABLE[cx.index as usize];
        if self.a < entry.qe {
            self.a = entry.qe;
            let d = cx.mps;
            cx.index = entry.nmps;
            d
        } else {
            self.a = entry.qe;
            let d = 1 - cx.mps;
            if entry.switch {
                cx.mps = 1 - cx.mps;
            }
            cx.index = entry.nlps;
            d
        }
    }
}
