//! Simulated BSC1 peripheral with a single I2C device behind it.

use std::collections::{BTreeMap, VecDeque};

use crate::interface::RegisterInterface;
use crate::registers::{
    bsc_word, ClockDivider, ClockStretchTimeout, Control, DataDelay, DataLength, Fifo, Register,
    SlaveAddress, Status, CLEAR_FIFO, FIFO_DEPTH, REG_A, REG_C, REG_CLKT, REG_DIV, REG_DLEN,
    REG_FIFO, REG_S,
};

/// Behaviour of the device attached to the simulated bus.
#[derive(Debug, Clone, Default)]
pub(crate) struct SimDevice {
    pub address: u8,
    /// NACK every transfer.
    pub nack: bool,
    /// Report a clock-stretch timeout on every transfer.
    pub stretch_timeout: bool,
    /// Bytes still sitting in the RX FIFO when DONE is first reported.
    pub trailing: usize,
    /// Read payloads keyed by the opcode of the last accepted write.
    pub responses: BTreeMap<[u8; 2], Vec<u8>>,
}

impl SimDevice {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            ..Self::default()
        }
    }

    pub fn respond(mut self, opcode: [u8; 2], payload: &[u8]) -> Self {
        self.responses.insert(opcode, payload.to_vec());
        self
    }
}

/// Register-level model of BSC1 plus plain memory for every other word.
pub(crate) struct SimPeripheral {
    pub device: SimDevice,
    /// Frames the device acknowledged, in order.
    pub frames: Vec<Vec<u8>>,
    memory: BTreeMap<usize, u32>,
    tx: VecDeque<u8>,
    rx: VecDeque<u8>,
    flags: Status,
    reading: bool,
    last_opcode: Option<[u8; 2]>,
}

impl SimPeripheral {
    pub fn new(device: SimDevice) -> Self {
        let mut memory = BTreeMap::new();
        for (address, reset) in [
            (Control::ADDRESS, Control::RESET_VALUE),
            (DataLength::ADDRESS, DataLength::RESET_VALUE),
            (SlaveAddress::ADDRESS, SlaveAddress::RESET_VALUE),
            (ClockDivider::ADDRESS, ClockDivider::RESET_VALUE),
            (DataDelay::ADDRESS, DataDelay::RESET_VALUE),
            (ClockStretchTimeout::ADDRESS, ClockStretchTimeout::RESET_VALUE),
        ] {
            memory.insert(bsc_word(address), reset);
        }

        Self {
            device,
            frames: Vec::new(),
            memory,
            tx: VecDeque::new(),
            rx: VecDeque::new(),
            flags: Status::new(),
            reading: false,
            last_opcode: None,
        }
    }

    /// Raw value of a word outside the BSC FIFO/status registers.
    pub fn word(&self, offset: usize) -> u32 {
        self.memory.get(&offset).copied().unwrap_or(0)
    }

    pub fn set_word(&mut self, offset: usize, value: u32) {
        self.memory.insert(offset, value);
    }

    fn register<Reg: Register>(&self) -> Reg {
        Reg::from(self.word(bsc_word(Reg::ADDRESS)))
    }

    fn addressed(&self) -> bool {
        self.register::<SlaveAddress>().addr() == self.device.address
    }

    fn fail_if_faulty(&mut self) -> bool {
        if self.device.nack || !self.addressed() {
            self.flags.set_err(true);
            self.flags.set_done(true);
        }
        if self.device.stretch_timeout {
            self.flags.set_clkt(true);
        }
        self.flags.err() || self.flags.clkt()
    }

    fn start_write(&mut self) {
        let len = usize::from(self.register::<DataLength>().dlen()).min(self.tx.len());
        let frame: Vec<u8> = self.tx.drain(..len).collect();
        if self.fail_if_faulty() {
            return;
        }
        if let &[hi, lo, ..] = frame.as_slice() {
            self.last_opcode = Some([hi, lo]);
        }
        self.frames.push(frame);
        self.flags.set_done(true);
    }

    fn start_read(&mut self) {
        if self.fail_if_faulty() {
            return;
        }
        let payload = self
            .last_opcode
            .and_then(|opcode| self.device.responses.get(&opcode))
            .cloned()
            .unwrap_or_default();
        self.rx.extend(payload);
        self.reading = true;
    }

    fn write_control(&mut self, value: u32) {
        let control = Control::from(value);
        if control.clear() == CLEAR_FIFO {
            self.tx.clear();
            self.rx.clear();
        }
        if control.i2c_enable() && control.start() {
            if control.read() {
                self.start_read();
            } else {
                self.start_write();
            }
        }
        self.memory.insert(bsc_word(REG_C), u32::from(control.with_start(false)));
    }

    fn status(&mut self) -> Status {
        if self.reading && self.rx.len() <= self.device.trailing {
            self.reading = false;
            self.flags.set_done(true);
        }

        self.flags
            .with_transfer_active(self.reading)
            .with_rxd(!self.rx.is_empty())
            .with_rxf(self.rx.len() >= FIFO_DEPTH)
            .with_txd(self.tx.len() < FIFO_DEPTH)
            .with_txe(self.tx.is_empty())
    }
}

impl RegisterInterface for SimPeripheral {
    fn read_word(&mut self, offset: usize) -> u32 {
        if offset == bsc_word(REG_S) {
            u32::from(self.status())
        } else if offset == bsc_word(REG_FIFO) {
            u32::from(Fifo::new().with_data(self.rx.pop_front().unwrap_or(0)))
        } else {
            self.word(offset)
        }
    }

    fn write_word(&mut self, offset: usize, value: u32) {
        if offset == bsc_word(REG_S) {
            let clear = u32::from(self.flags) & value & u32::from(Status::clear_flags());
            self.flags = Status::from(u32::from(self.flags) & !clear);
        } else if offset == bsc_word(REG_FIFO) {
            if self.tx.len() < FIFO_DEPTH {
                self.tx.push_back(Fifo::from(value).data());
            }
        } else if offset == bsc_word(REG_C) {
            self.write_control(value);
        } else if offset == bsc_word(REG_A) {
            self.memory.insert(offset, value & 0x7F);
        } else if [REG_DLEN, REG_DIV, REG_CLKT].map(bsc_word).contains(&offset) {
            self.memory.insert(offset, value & 0xFFFF);
        } else {
            self.memory.insert(offset, value);
        }
    }
}
