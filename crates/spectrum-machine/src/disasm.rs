//! Z80 disassembler for trace output.
//!
//! Reads bytes strictly through the caller-provided reader, which goes via
//! the paging model, so the listing shows what the CPU would actually fetch.
//! Coverage is the common matrix plus the `CB`, `ED`, `DD` and `FD`
//! prefixes; anything else falls back to a `DB` byte line.

/// Disassemble one instruction starting at `addr`.
///
/// Returns the mnemonic and the instruction length in bytes.
pub fn disassemble(read: &mut dyn FnMut(u16) -> u8, addr: u16) -> (String, u16) {
    Disasm { read, addr, len: 0 }.instruction()
}

struct Disasm<'a> {
    read: &'a mut dyn FnMut(u16) -> u8,
    addr: u16,
    len: u16,
}

impl Disasm<'_> {
    fn next8(&mut self) -> u8 {
        let b = (self.read)(self.addr.wrapping_add(self.len));
        self.len += 1;
        b
    }

    fn next16(&mut self) -> u16 {
        let lo = self.next8();
        let hi = self.next8();
        u16::from_le_bytes([lo, hi])
    }

    /// Branch target of a relative jump whose displacement byte is next.
    fn rel_target(&mut self) -> u16 {
        let disp = self.next8() as i8;
        self.addr
            .wrapping_add(self.len)
            .wrapping_add(disp as u16)
    }

    fn instruction(mut self) -> (String, u16) {
        let op = self.next8();
        let text = match op {
            0xCB => self.cb_prefixed(),
            0xED => self.ed_prefixed(),
            0xDD => self.index_prefixed("ix"),
            0xFD => self.index_prefixed("iy"),
            _ => self.unprefixed(op, "hl", "h", "l"),
        };
        (text, self.len)
    }

    /// The unprefixed matrix. `rp`/`rh`/`rl` substitute the index pair for
    /// DD/FD-prefixed opcodes.
    fn unprefixed(&mut self, op: u8, rp: &str, rh: &str, rl: &str) -> String {
        let indexed = rp != "hl";
        match op {
            0x00 => "nop".into(),
            0x01 => format!("ld bc, {:#06x}", self.next16()),
            0x02 => "ld (bc), a".into(),
            0x07 => "rlca".into(),
            0x08 => "ex af, af'".into(),
            0x09 => format!("add {rp}, bc"),
            0x0A => "ld a, (bc)".into(),
            0x0F => "rrca".into(),
            0x10 => format!("djnz {:#06x}", self.rel_target()),
            0x11 => format!("ld de, {:#06x}", self.next16()),
            0x12 => "ld (de), a".into(),
            0x17 => "rla".into(),
            0x18 => format!("jr {:#06x}", self.rel_target()),
            0x19 => format!("add {rp}, de"),
            0x1A => "ld a, (de)".into(),
            0x1F => "rra".into(),
            0x20 => format!("jr nz, {:#06x}", self.rel_target()),
            0x21 => format!("ld {rp}, {:#06x}", self.next16()),
            0x22 => format!("ld ({:#06x}), {rp}", self.next16()),
            0x27 => "daa".into(),
            0x28 => format!("jr z, {:#06x}", self.rel_target()),
            0x29 => format!("add {rp}, {rp}"),
            0x2A => format!("ld {rp}, ({:#06x})", self.next16()),
            0x2F => "cpl".into(),
            0x30 => format!("jr nc, {:#06x}", self.rel_target()),
            0x31 => format!("ld sp, {:#06x}", self.next16()),
            0x32 => format!("ld ({:#06x}), a", self.next16()),
            0x37 => "scf".into(),
            0x38 => format!("jr c, {:#06x}", self.rel_target()),
            0x39 => format!("add {rp}, sp"),
            0x3A => format!("ld a, ({:#06x})", self.next16()),
            0x3F => "ccf".into(),

            0x03 | 0x13 | 0x23 | 0x33 => format!("inc {}", self.rp_name(op >> 4, rp)),
            0x0B | 0x1B | 0x2B | 0x3B => format!("dec {}", self.rp_name(op >> 4, rp)),

            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
                let r = self.reg_name((op >> 3) & 7, rp, rh, rl, indexed);
                format!("inc {r}")
            }
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
                let r = self.reg_name((op >> 3) & 7, rp, rh, rl, indexed);
                format!("dec {r}")
            }
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
                let r = self.reg_name((op >> 3) & 7, rp, rh, rl, indexed);
                format!("ld {r}, {:#04x}", self.next8())
            }

            0x76 => "halt".into(),
            0x40..=0x7F => {
                // An indexed (ix+d) operand forces the other operand to the
                // plain register set.
                let src_mem = op & 7 == 6;
                let dst_mem = (op >> 3) & 7 == 6;
                let dst = if src_mem && indexed {
                    self.reg_name((op >> 3) & 7, "hl", "h", "l", false)
                } else {
                    self.reg_name((op >> 3) & 7, rp, rh, rl, indexed)
                };
                let src = if dst_mem && indexed {
                    self.reg_name(op & 7, "hl", "h", "l", false)
                } else {
                    self.reg_name(op & 7, rp, rh, rl, indexed)
                };
                format!("ld {dst}, {src}")
            }

            0x80..=0xBF => {
                let operand = self.reg_name(op & 7, rp, rh, rl, indexed);
                format!("{} {operand}", alu_name((op >> 3) & 7))
            }

            0xC0 | 0xC8 | 0xD0 | 0xD8 | 0xE0 | 0xE8 | 0xF0 | 0xF8 => {
                format!("ret {}", cond_name((op >> 3) & 7))
            }
            0xC1 | 0xD1 | 0xE1 | 0xF1 => format!("pop {}", self.rp2_name(op >> 4, rp)),
            0xC5 | 0xD5 | 0xE5 | 0xF5 => format!("push {}", self.rp2_name(op >> 4, rp)),
            0xC2 | 0xCA | 0xD2 | 0xDA | 0xE2 | 0xEA | 0xF2 | 0xFA => {
                format!("jp {}, {:#06x}", cond_name((op >> 3) & 7), self.next16())
            }
            0xC3 => format!("jp {:#06x}", self.next16()),
            0xC4 | 0xCC | 0xD4 | 0xDC | 0xE4 | 0xEC | 0xF4 | 0xFC => {
                format!("call {}, {:#06x}", cond_name((op >> 3) & 7), self.next16())
            }
            0xC9 => "ret".into(),
            0xCD => format!("call {:#06x}", self.next16()),
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                format!("{} {:#04x}", alu_name((op >> 3) & 7), self.next8())
            }
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                format!("rst {:#04x}", op & 0x38)
            }

            0xD3 => format!("out ({:#04x}), a", self.next8()),
            0xD9 => "exx".into(),
            0xDB => format!("in a, ({:#04x})", self.next8()),
            0xE3 => format!("ex (sp), {rp}"),
            0xE9 => format!("jp ({rp})"),
            0xEB => "ex de, hl".into(),
            0xF3 => "di".into(),
            0xF9 => format!("ld sp, {rp}"),
            0xFB => "ei".into(),

            _ => format!("db {op:#04x}"),
        }
    }

    fn cb_prefixed(&mut self) -> String {
        let op = self.next8();
        let r = plain_reg_name(op & 7);
        match op {
            0x00..=0x3F => format!("{} {r}", rot_name((op >> 3) & 7)),
            0x40..=0x7F => format!("bit {}, {r}", (op >> 3) & 7),
            0x80..=0xBF => format!("res {}, {r}", (op >> 3) & 7),
            _ => format!("set {}, {r}", (op >> 3) & 7),
        }
    }

    fn ed_prefixed(&mut self) -> String {
        let op = self.next8();
        match op {
            0x40 | 0x48 | 0x50 | 0x58 | 0x60 | 0x68 | 0x78 => {
                format!("in {}, (c)", plain_reg_name((op >> 3) & 7))
            }
            0x70 => "in (c)".into(),
            0x41 | 0x49 | 0x51 | 0x59 | 0x61 | 0x69 | 0x79 => {
                format!("out (c), {}", plain_reg_name((op >> 3) & 7))
            }
            0x71 => "out (c), 0".into(),
            0x42 | 0x52 | 0x62 | 0x72 => format!("sbc hl, {}", self.rp_name(op >> 4 & 3, "hl")),
            0x4A | 0x5A | 0x6A | 0x7A => format!("adc hl, {}", self.rp_name(op >> 4 & 3, "hl")),
            0x43 | 0x53 | 0x63 | 0x73 => {
                let rp = self.rp_name(op >> 4 & 3, "hl");
                format!("ld ({:#06x}), {rp}", self.next16())
            }
            0x4B | 0x5B | 0x6B | 0x7B => {
                let rp = self.rp_name(op >> 4 & 3, "hl");
                format!("ld {rp}, ({:#06x})", self.next16())
            }
            0x44 => "neg".into(),
            0x45 => "retn".into(),
            0x4D => "reti".into(),
            0x46 | 0x66 => "im 0".into(),
            0x56 | 0x76 => "im 1".into(),
            0x5E | 0x7E => "im 2".into(),
            0x47 => "ld i, a".into(),
            0x4F => "ld r, a".into(),
            0x57 => "ld a, i".into(),
            0x5F => "ld a, r".into(),
            0x67 => "rrd".into(),
            0x6F => "rld".into(),
            0xA0 => "ldi".into(),
            0xA1 => "cpi".into(),
            0xA2 => "ini".into(),
            0xA3 => "outi".into(),
            0xA8 => "ldd".into(),
            0xA9 => "cpd".into(),
            0xAA => "ind".into(),
            0xAB => "outd".into(),
            0xB0 => "ldir".into(),
            0xB1 => "cpir".into(),
            0xB2 => "inir".into(),
            0xB3 => "otir".into(),
            0xB8 => "lddr".into(),
            0xB9 => "cpdr".into(),
            0xBA => "indr".into(),
            0xBB => "otdr".into(),
            _ => format!("db 0xed, {op:#04x}"),
        }
    }

    fn index_prefixed(&mut self, rp: &str) -> String {
        let op = self.next8();
        let (rh, rl) = if rp == "ix" { ("ixh", "ixl") } else { ("iyh", "iyl") };
        match op {
            0xCB => self.index_cb(rp),
            0xDD | 0xED | 0xFD => {
                // Prefix chain: the leading prefix acts as a plain prefix
                // byte; show it alone and restart at the next byte.
                self.len -= 1;
                format!("db {:#04x}", if rp == "ix" { 0xDD } else { 0xFD })
            }
            _ => self.unprefixed(op, rp, rh, rl),
        }
    }

    fn index_cb(&mut self, rp: &str) -> String {
        let disp = self.next8() as i8;
        let op = self.next8();
        let target = indexed_operand(rp, disp);
        let tail = if op & 7 == 6 || op & 0xC0 == 0x40 {
            String::new()
        } else {
            // Undocumented: result also copied to a plain register.
            format!(", {}", plain_reg_name(op & 7))
        };
        match op {
            0x00..=0x3F => format!("{} {target}{tail}", rot_name((op >> 3) & 7)),
            0x40..=0x7F => format!("bit {}, {target}", (op >> 3) & 7),
            0x80..=0xBF => format!("res {}, {target}{tail}", (op >> 3) & 7),
            _ => format!("set {}, {target}{tail}", (op >> 3) & 7),
        }
    }

    /// Register-pair name for the `inc rp`/`add rp` group.
    fn rp_name(&mut self, code: u8, rp: &str) -> String {
        match code & 3 {
            0 => "bc".into(),
            1 => "de".into(),
            2 => rp.into(),
            _ => "sp".into(),
        }
    }

    /// Register-pair name for the `push`/`pop` group (AF instead of SP).
    fn rp2_name(&mut self, code: u8, rp: &str) -> String {
        match code & 3 {
            0 => "bc".into(),
            1 => "de".into(),
            2 => rp.into(),
            _ => "af".into(),
        }
    }

    /// Register operand name, consuming a displacement byte for `(ix+d)`.
    fn reg_name(&mut self, code: u8, rp: &str, rh: &str, rl: &str, indexed: bool) -> String {
        match code {
            4 => rh.into(),
            5 => rl.into(),
            6 => {
                if indexed {
                    let disp = self.next8() as i8;
                    indexed_operand(rp, disp)
                } else {
                    "(hl)".into()
                }
            }
            _ => plain_reg_name(code).into(),
        }
    }
}

/// Format an `(ix+d)` / `(iy-d)` operand.
fn indexed_operand(rp: &str, disp: i8) -> String {
    if disp < 0 {
        format!("({rp}-{:#04x})", -i16::from(disp))
    } else {
        format!("({rp}+{disp:#04x})")
    }
}

fn plain_reg_name(code: u8) -> &'static str {
    match code & 7 {
        0 => "b",
        1 => "c",
        2 => "d",
        3 => "e",
        4 => "h",
        5 => "l",
        6 => "(hl)",
        _ => "a",
    }
}

fn alu_name(code: u8) -> &'static str {
    match code & 7 {
        0 => "add a,",
        1 => "adc a,",
        2 => "sub",
        3 => "sbc a,",
        4 => "and",
        5 => "xor",
        6 => "or",
        _ => "cp",
    }
}

fn cond_name(code: u8) -> &'static str {
    match code & 7 {
        0 => "nz",
        1 => "z",
        2 => "nc",
        3 => "c",
        4 => "po",
        5 => "pe",
        6 => "p",
        _ => "m",
    }
}

fn rot_name(code: u8) -> &'static str {
    match code & 7 {
        0 => "rlc",
        1 => "rrc",
        2 => "rl",
        3 => "rr",
        4 => "sla",
        5 => "sra",
        6 => "sll",
        _ => "srl",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disasm(bytes: &[u8]) -> (String, u16) {
        let mut read = |addr: u16| bytes.get(addr as usize).copied().unwrap_or(0);
        disassemble(&mut read, 0)
    }

    #[test]
    fn basics() {
        assert_eq!(disasm(&[0x00]), ("nop".into(), 1));
        assert_eq!(disasm(&[0x76]), ("halt".into(), 1));
        assert_eq!(disasm(&[0xF3]), ("di".into(), 1));
        assert_eq!(disasm(&[0xFB]), ("ei".into(), 1));
    }

    #[test]
    fn loads() {
        assert_eq!(disasm(&[0x21, 0x34, 0x12]), ("ld hl, 0x1234".into(), 3));
        assert_eq!(disasm(&[0x3E, 0x7F]), ("ld a, 0x7f".into(), 2));
        assert_eq!(disasm(&[0x7E]), ("ld a, (hl)".into(), 1));
        assert_eq!(disasm(&[0x36, 0x55]), ("ld (hl), 0x55".into(), 2));
        assert_eq!(disasm(&[0x32, 0x00, 0x40]), ("ld (0x4000), a".into(), 3));
    }

    #[test]
    fn alu_and_conditions() {
        assert_eq!(disasm(&[0x80]), ("add a, b".into(), 1));
        assert_eq!(disasm(&[0xAF]), ("xor a".into(), 1));
        assert_eq!(disasm(&[0xFE, 0x0A]), ("cp 0x0a".into(), 2));
        assert_eq!(disasm(&[0xC8]), ("ret z".into(), 1));
        assert_eq!(
            disasm(&[0xD2, 0x00, 0x80]),
            ("jp nc, 0x8000".into(), 3)
        );
    }

    #[test]
    fn relative_jumps_resolve_target() {
        // jr -2 at address 0 loops to itself.
        assert_eq!(disasm(&[0x18, 0xFE]), ("jr 0x0000".into(), 2));
        assert_eq!(disasm(&[0x20, 0x02]), ("jr nz, 0x0004".into(), 2));
        assert_eq!(disasm(&[0x10, 0x00]), ("djnz 0x0002".into(), 2));
    }

    #[test]
    fn io_and_rst() {
        assert_eq!(disasm(&[0xD3, 0xFE]), ("out (0xfe), a".into(), 2));
        assert_eq!(disasm(&[0xDB, 0xFE]), ("in a, (0xfe)".into(), 2));
        assert_eq!(disasm(&[0xFF]), ("rst 0x38".into(), 1));
    }

    #[test]
    fn cb_prefix() {
        assert_eq!(disasm(&[0xCB, 0x00]), ("rlc b".into(), 2));
        assert_eq!(disasm(&[0xCB, 0x47]), ("bit 0, a".into(), 2));
        assert_eq!(disasm(&[0xCB, 0xFE]), ("set 7, (hl)".into(), 2));
    }

    #[test]
    fn ed_prefix() {
        assert_eq!(disasm(&[0xED, 0x79]), ("out (c), a".into(), 2));
        assert_eq!(disasm(&[0xED, 0xB0]), ("ldir".into(), 2));
        assert_eq!(disasm(&[0xED, 0x56]), ("im 1".into(), 2));
        assert_eq!(
            disasm(&[0xED, 0x43, 0xCD, 0xAB]),
            ("ld (0xabcd), bc".into(), 4)
        );
        assert_eq!(disasm(&[0xED, 0x04]), ("db 0xed, 0x04".into(), 2));
    }

    #[test]
    fn index_prefix() {
        assert_eq!(
            disasm(&[0xDD, 0x21, 0x00, 0xC0]),
            ("ld ix, 0xc000".into(), 4)
        );
        assert_eq!(disasm(&[0xDD, 0x7E, 0x05]), ("ld a, (ix+0x05)".into(), 3));
        assert_eq!(disasm(&[0xFD, 0x7E, 0xFB]), ("ld a, (iy-0x05)".into(), 3));
        assert_eq!(disasm(&[0xDD, 0x24]), ("inc ixh".into(), 2));
        assert_eq!(
            disasm(&[0xDD, 0x36, 0x02, 0x99]),
            ("ld (ix+0x02), 0x99".into(), 4)
        );
    }

    #[test]
    fn index_cb() {
        assert_eq!(
            disasm(&[0xDD, 0xCB, 0x03, 0x46]),
            ("bit 0, (ix+0x03)".into(), 4)
        );
        assert_eq!(
            disasm(&[0xFD, 0xCB, 0xFF, 0xC6]),
            ("set 0, (iy-0x01)".into(), 4)
        );
        assert_eq!(
            disasm(&[0xDD, 0xCB, 0x02, 0xC0]),
            ("set 0, (ix+0x02), b".into(), 4)
        );
    }
}
