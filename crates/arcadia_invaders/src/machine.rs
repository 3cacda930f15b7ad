use crate::cpu::{Bus, Cpu, CpuError};
use arcadia_common::Key;

/// Total addressable memory (64 KiB, flat and always writable).
const MEMORY_SIZE: usize = 0x10000;

/// Video RAM window used by the game: 0x1c00 bytes at 0x2400, one bit
/// per pixel, 224 columns of 32 bytes.
const VRAM_START: usize = 0x2400;
const VRAM_SIZE: usize = 0x1c00;

pub const FRAME_RATE_HZ: u32 = 60;

/// Frame pacing is instruction-counted, not clock-counted: the hardware
/// fires its two scanline interrupts twice per 60 Hz frame, and 4000
/// instructions per frame keeps the game at its original speed.
pub const INSTRUCTIONS_PER_FRAME: u32 = 4000;

// Input port 1: coin, start buttons and player 1 controls.
const IN1_BIT_COIN: u8 = 0;
const IN1_BIT_P2_START: u8 = 1;
const IN1_BIT_P1_START: u8 = 2;
const IN1_BIT_ALWAYS_ONE: u8 = 3;
const IN1_BIT_P1_FIRE: u8 = 4;
const IN1_BIT_P1_LEFT: u8 = 5;
const IN1_BIT_P1_RIGHT: u8 = 6;

// Input port 2: player 2 controls, tilt and the DIP switches.
const IN2_BIT_TILT: u8 = 2;
const IN2_BIT_EXTRA_SHIP: u8 = 3;
const IN2_BIT_P2_FIRE: u8 = 4;
const IN2_BIT_P2_LEFT: u8 = 5;
const IN2_BIT_P2_RIGHT: u8 = 6;
const IN2_BIT_COIN_INFO: u8 = 7;
const IN2_MASK_SHIPS: u8 = 0x03;

/// Input port 0 is mostly unused by the ROM: a fixed 0x8E pattern with
/// the self-test DIP in bit 0 and the player-1 controls mirrored in
/// bits 4-6.
const IN0_BASE: u8 = 0x8e;
const IN0_P1_MASK: u8 = 0x70;

/// The cabinet DIP switches surfaced on input ports 0 and 2.
///
/// `ships_per_credit` is 3-6, encoded as `value - 3` in bits 0-1 of
/// port 2. `extra_ship_at_1000` moves the bonus ship from 1500 to 1000
/// points. `show_coin_info` drives the attract-mode credit line; the
/// ROM reads bit 7 = 1 as "hide".
#[derive(Clone, Copy, Debug)]
pub struct DipSwitches {
    pub ships_per_credit: u8,
    pub extra_ship_at_1000: bool,
    pub show_coin_info: bool,
    pub self_test: bool,
}

impl Default for DipSwitches {
    fn default() -> Self {
        Self {
            ships_per_credit: 3,
            extra_ship_at_1000: false,
            show_coin_info: true,
            self_test: false,
        }
    }
}

impl DipSwitches {
    fn apply_to_port2(&self, port: &mut u8) {
        *port &= !(IN2_MASK_SHIPS | 1 << IN2_BIT_EXTRA_SHIP | 1 << IN2_BIT_COIN_INFO);

        let ships = self.ships_per_credit.clamp(3, 6);
        *port |= (ships - 3) & IN2_MASK_SHIPS;

        if self.extra_ship_at_1000 {
            *port |= 1 << IN2_BIT_EXTRA_SHIP;
        }
        if !self.show_coin_info {
            *port |= 1 << IN2_BIT_COIN_INFO;
        }
    }
}

/// The 16-bit shift register the cabinet bolts onto the 8080 to make
/// sprite shifting affordable. Writes to port 4 roll new data into the
/// high byte; port 2 picks the read window; port 3 reads it back.
#[derive(Default)]
struct ShiftRegister {
    value: u16,
    offset: u8,
}

impl ShiftRegister {
    fn load(&mut self, data: u8) {
        self.value = u16::from(data) << 8 | self.value >> 8;
    }

    fn set_offset(&mut self, data: u8) {
        self.offset = data & 0x07;
    }

    fn read(&self) -> u8 {
        (self.value >> (8 - self.offset)) as u8
    }
}

/// Memory, IO latches and the shift register: everything the CPU sees.
struct MachineBus {
    memory: [u8; MEMORY_SIZE],
    in_port0: u8,
    in_port1: u8,
    in_port2: u8,
    out_port3: u8,
    out_port5: u8,
    shifter: ShiftRegister,
}

impl Default for MachineBus {
    fn default() -> Self {
        Self {
            memory: [0; MEMORY_SIZE],
            in_port0: IN0_BASE,
            in_port1: 1 << IN1_BIT_ALWAYS_ONE,
            in_port2: 0,
            out_port3: 0,
            out_port5: 0,
            shifter: ShiftRegister::default(),
        }
    }
}

impl Bus for MachineBus {
    fn read8(&mut self, addr: u16) -> u8 {
        self.memory[addr as usize]
    }

    fn write8(&mut self, addr: u16, value: u8) {
        self.memory[addr as usize] = value;
    }

    fn port_in(&mut self, port: u8) -> u8 {
        match port {
            0 => self.in_port0 | self.in_port1 & IN0_P1_MASK,
            1 => self.in_port1,
            2 => self.in_port2,
            3 => self.shifter.read(),
            _ => {
                log::warn!("IN from unmapped port {port}");
                0
            }
        }
    }

    fn port_out(&mut self, port: u8, value: u8) {
        match port {
            2 => self.shifter.set_offset(value),
            3 => self.out_port3 = value,
            4 => self.shifter.load(value),
            5 => self.out_port5 = value,
            6 => {} // watchdog pulse
            _ => log::warn!("OUT {value:#04x} to unmapped port {port}"),
        }
    }
}

/// The Space Invaders cabinet: an 8080 plus the bus state above.
pub struct InvadersMachine {
    cpu: Cpu,
    bus: MachineBus,
    dips: DipSwitches,
}

impl InvadersMachine {
    pub fn new() -> Self {
        Self::with_dips(DipSwitches::default())
    }

    pub fn with_dips(dips: DipSwitches) -> Self {
        let mut machine = Self {
            cpu: Cpu::new(),
            bus: MachineBus::default(),
            dips,
        };
        machine.apply_dips();
        machine
    }

    fn apply_dips(&mut self) {
        self.dips.apply_to_port2(&mut self.bus.in_port2);
        self.bus.in_port0 = IN0_BASE | u8::from(self.dips.self_test);
    }

    /// Back to power-on state. Memory (ROM and RAM contents) survives,
    /// IO latches and the shift register do not.
    pub fn reset(&mut self) {
        self.cpu.reset();
        let memory = self.bus.memory;
        self.bus = MachineBus::default();
        self.bus.memory = memory;
        self.apply_dips();
    }

    /// Copy a combined ROM image in at 0x0000, where execution starts.
    pub fn load_rom(&mut self, rom: &[u8]) {
        let len = rom.len().min(MEMORY_SIZE);
        self.bus.memory[..len].copy_from_slice(&rom[..len]);
        self.cpu.pc = 0x0000;
        log::info!("loaded {len} ROM bytes");
    }

    /// Run one 60 Hz frame: half the frame's instructions, the
    /// mid-frame interrupt (RST 1), the other half, the vblank
    /// interrupt (RST 2). Interrupts land between instructions only.
    pub fn step_frame(&mut self) -> Result<(), CpuError> {
        let half = INSTRUCTIONS_PER_FRAME / 2;
        for _ in 0..half {
            self.cpu.step(&mut self.bus)?;
        }
        self.cpu.interrupt(&mut self.bus, 1);
        for _ in 0..half {
            self.cpu.step(&mut self.bus)?;
        }
        self.cpu.interrupt(&mut self.bus, 2);
        Ok(())
    }

    /// Map a logical key onto the input port bits.
    ///
    /// Coin, starts, movement and fire all track the key state. Tilt
    /// only latches on press, the way the cabinet's tilt switch pulses;
    /// the game clears it itself.
    pub fn handle_key(&mut self, key: Key, pressed: bool) {
        match key {
            Key::C => set_bit(&mut self.bus.in_port1, IN1_BIT_COIN, pressed),
            Key::Num1 => set_bit(&mut self.bus.in_port1, IN1_BIT_P1_START, pressed),
            Key::Num2 => set_bit(&mut self.bus.in_port1, IN1_BIT_P2_START, pressed),
            Key::A | Key::Left => set_bit(&mut self.bus.in_port1, IN1_BIT_P1_LEFT, pressed),
            Key::D | Key::Right => set_bit(&mut self.bus.in_port1, IN1_BIT_P1_RIGHT, pressed),
            Key::S | Key::Space => set_bit(&mut self.bus.in_port1, IN1_BIT_P1_FIRE, pressed),
            Key::J => set_bit(&mut self.bus.in_port2, IN2_BIT_P2_LEFT, pressed),
            Key::L => set_bit(&mut self.bus.in_port2, IN2_BIT_P2_RIGHT, pressed),
            Key::K => set_bit(&mut self.bus.in_port2, IN2_BIT_P2_FIRE, pressed),
            Key::T if pressed => set_bit(&mut self.bus.in_port2, IN2_BIT_TILT, true),
            _ => {}
        }
    }

    /// The raw 1bpp framebuffer window for the renderer.
    pub fn video_ram(&self) -> &[u8] {
        &self.bus.memory[VRAM_START..VRAM_START + VRAM_SIZE]
    }

    /// Current sound latches (OUT 3, OUT 5) for the audio layer.
    pub fn sound_ports(&self) -> (u8, u8) {
        (self.bus.out_port3, self.bus.out_port5)
    }

    /// Instructions executed since power-on.
    pub fn instructions(&self) -> u64 {
        self.cpu.instructions()
    }
}

impl Default for InvadersMachine {
    fn default() -> Self {
        Self::new()
    }
}

fn set_bit(port: &mut u8, bit: u8, on: bool) {
    if on {
        *port |= 1 << bit;
    } else {
        *port &= !(1 << bit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_register_windows() {
        let mut bus = MachineBus::default();

        bus.port_out(4, 0xaa); // reg = 0xAA00
        assert_eq!(bus.port_in(3), 0xaa, "offset 0 reads the high byte");

        bus.port_out(2, 3);
        // (0xAA00 >> 5) & 0xFF
        assert_eq!(bus.port_in(3), 0x50);

        bus.port_out(4, 0xff); // reg = 0xFFAA
        bus.port_out(2, 0);
        assert_eq!(bus.port_in(3), 0xff);
        bus.port_out(2, 7);
        // (0xFFAA >> 1) & 0xFF
        assert_eq!(bus.port_in(3), 0xd5);
    }

    #[test]
    fn shift_register_through_the_cpu() {
        // MVI A,0xAA; OUT 4; MVI A,3; OUT 2; IN 3
        let mut machine = InvadersMachine::new();
        machine.load_rom(&[0x3e, 0xaa, 0xd3, 0x04, 0x3e, 0x03, 0xd3, 0x02, 0xdb, 0x03]);

        for _ in 0..5 {
            machine.cpu.step(&mut machine.bus).unwrap();
        }
        assert_eq!(machine.cpu.a, 0x50);
    }

    #[test]
    fn dip_switches_encode_onto_the_ports() {
        let machine = InvadersMachine::with_dips(DipSwitches {
            ships_per_credit: 6,
            extra_ship_at_1000: true,
            show_coin_info: false,
            self_test: true,
        });
        assert_eq!(machine.bus.in_port2 & IN2_MASK_SHIPS, 0x03);
        assert_ne!(machine.bus.in_port2 & (1 << IN2_BIT_EXTRA_SHIP), 0);
        assert_ne!(machine.bus.in_port2 & (1 << IN2_BIT_COIN_INFO), 0);
        assert_eq!(machine.bus.in_port0, IN0_BASE | 0x01);

        let defaults = InvadersMachine::new();
        assert_eq!(defaults.bus.in_port2 & IN2_MASK_SHIPS, 0x00);
        assert_eq!(defaults.bus.in_port2 & (1 << IN2_BIT_COIN_INFO), 0);
    }

    #[test]
    fn port1_has_bit3_wired_high() {
        let mut machine = InvadersMachine::new();
        assert_ne!(machine.bus.port_in(1) & (1 << IN1_BIT_ALWAYS_ONE), 0);

        machine.handle_key(Key::C, true);
        assert_ne!(machine.bus.port_in(1) & 0x01, 0);
        machine.handle_key(Key::C, false);
        assert_eq!(machine.bus.port_in(1) & 0x01, 0);
    }

    #[test]
    fn port0_mirrors_player1_controls() {
        let mut machine = InvadersMachine::new();
        assert_eq!(machine.bus.port_in(0), IN0_BASE);

        machine.handle_key(Key::Right, true);
        assert_ne!(machine.bus.port_in(0) & (1 << IN1_BIT_P1_RIGHT), 0);
    }

    #[test]
    fn tilt_latches_on_press_only() {
        let mut machine = InvadersMachine::new();
        machine.handle_key(Key::T, true);
        machine.handle_key(Key::T, false);
        assert_ne!(machine.bus.in_port2 & (1 << IN2_BIT_TILT), 0);
    }

    #[test]
    fn frame_fires_the_mid_frame_interrupt() {
        // LXI SP,0x2400; EI; then a sled of NOPs
        let mut machine = InvadersMachine::new();
        machine.load_rom(&[0x31, 0x00, 0x24, 0xfb]);

        machine.step_frame().unwrap();
        // RST 1 pushed a return address; RST 2 was masked because the
        // handler (all NOPs here) never re-enabled interrupts.
        assert_eq!(machine.cpu.sp, 0x23fe);
        assert!(!machine.cpu.inte);
    }

    #[test]
    fn frame_propagates_cpu_errors() {
        let mut machine = InvadersMachine::new();
        machine.load_rom(&[0xcb]);
        let err = machine.step_frame().unwrap_err();
        assert_eq!(err, CpuError::UnknownOpcode { pc: 0, opcode: 0xcb });
    }

    #[test]
    fn reset_preserves_memory_but_not_io_state() {
        let mut machine = InvadersMachine::new();
        machine.load_rom(&[0x3e, 0x07, 0xd3, 0x02]); // MVI A,7; OUT 2
        machine.cpu.step(&mut machine.bus).unwrap();
        machine.cpu.step(&mut machine.bus).unwrap();
        assert_eq!(machine.bus.shifter.offset, 7);

        machine.reset();
        assert_eq!(machine.bus.shifter.offset, 0);
        assert_eq!(machine.bus.memory[0], 0x3e);
        assert_eq!(machine.instructions(), 0);
    }

    #[test]
    fn video_ram_is_the_expected_window() {
        let mut machine = InvadersMachine::new();
        machine.bus.memory[VRAM_START] = 0xab;
        machine.bus.memory[VRAM_START + VRAM_SIZE - 1] = 0xcd;
        let vram = machine.video_ram();
        assert_eq!(vram.len(), VRAM_SIZE);
        assert_eq!(vram[0], 0xab);
        assert_eq!(vram[VRAM_SIZE - 1], 0xcd);
    }
}
