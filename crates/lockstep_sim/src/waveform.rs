//! Waveform export of committed signal values.
//!
//! The [`WaveformRecorder`] trait is the sink a [`Trace`](crate::trace::Trace)
//! replays into. [`VcdRecorder`] writes IEEE 1364 Value Change Dump text
//! that GTKWave, Surfer and similar viewers open directly.

use std::collections::HashMap;
use std::io::Write;

use lockstep_common::{SignalType, Value};
use lockstep_ir::SignalId;

use crate::error::SimError;

/// Sink for committed signal values over time.
pub trait WaveformRecorder {
    /// Declares a signal inside the current scope.
    fn register_signal(&mut self, id: SignalId, name: &str, ty: SignalType) -> Result<(), SimError>;

    /// Opens a scope; busses map to one scope each.
    fn begin_scope(&mut self, name: &str) -> Result<(), SimError>;

    /// Closes the current scope.
    fn end_scope(&mut self) -> Result<(), SimError>;

    /// Records that `id` holds `value` from `time_ps` on.
    fn record_change(&mut self, time_ps: u64, id: SignalId, value: &Value) -> Result<(), SimError>;

    /// Flushes output and writes any trailer.
    fn finalize(&mut self) -> Result<(), SimError>;
}

/// VCD writer with a 1ps timescale.
///
/// Identifier codes are printable ASCII starting at `!`.
pub struct VcdRecorder<W: Write> {
    writer: W,
    codes: HashMap<SignalId, (String, SignalType)>,
    next_code: u32,
    header_written: bool,
    current_time: Option<u64>,
}

impl<W: Write> VcdRecorder<W> {
    /// Creates a recorder writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            codes: HashMap::new(),
            next_code: 0,
            header_written: false,
            current_time: None,
        }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn ensure_header(&mut self) -> Result<(), SimError> {
        if self.header_written {
            return Ok(());
        }
        writeln!(self.writer, "$date")?;
        writeln!(self.writer, "  Lockstep run")?;
        writeln!(self.writer, "$end")?;
        writeln!(self.writer, "$version")?;
        writeln!(self.writer, "  Lockstep {}", env!("CARGO_PKG_VERSION"))?;
        writeln!(self.writer, "$end")?;
        writeln!(self.writer, "$timescale")?;
        writeln!(self.writer, "  1ps")?;
        writeln!(self.writer, "$end")?;
        self.header_written = true;
        Ok(())
    }

    /// Identifier code for the `index`-th registered signal.
    fn make_id_code(index: u32) -> String {
        let mut code = String::new();
        let mut idx = index;
        loop {
            code.push((b'!' + (idx % 94) as u8) as char);
            idx /= 94;
            if idx == 0 {
                break;
            }
            idx -= 1;
        }
        code
    }
}

impl<W: Write> WaveformRecorder for VcdRecorder<W> {
    fn register_signal(&mut self, id: SignalId, name: &str, ty: SignalType) -> Result<(), SimError> {
        self.ensure_header()?;
        let code = Self::make_id_code(self.next_code);
        self.next_code += 1;
        writeln!(self.writer, "$var wire {} {code} {name} $end", ty.width())?;
        self.codes.insert(id, (code, ty));
        Ok(())
    }

    fn begin_scope(&mut self, name: &str) -> Result<(), SimError> {
        self.ensure_header()?;
        writeln!(self.writer, "$scope module {name} $end")?;
        Ok(())
    }

    fn end_scope(&mut self) -> Result<(), SimError> {
        writeln!(self.writer, "$upscope $end")?;
        Ok(())
    }

    fn record_change(&mut self, time_ps: u64, id: SignalId, value: &Value) -> Result<(), SimError> {
        self.ensure_header()?;
        if self.current_time != Some(time_ps) {
            if self.current_time.is_none() {
                writeln!(self.writer, "$enddefinitions $end")?;
            }
            writeln!(self.writer, "#{time_ps}")?;
            self.current_time = Some(time_ps);
        }

        let (code, ty) = self
            .codes
            .get(&id)
            .ok_or_else(|| SimError::UnknownSignal(format!("{id} (not registered for VCD)")))?;
        let bits = ty.to_bits(value);
        if ty.width() == 1 {
            writeln!(self.writer, "{bits}{code}")?;
        } else {
            writeln!(self.writer, "b{bits} {code}")?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SimError> {
        if self.current_time.is_none() {
            self.ensure_header()?;
            writeln!(self.writer, "$enddefinitions $end")?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
