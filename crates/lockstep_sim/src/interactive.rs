//! Line-oriented debugger over a [`Simulation`].
//!
//! Commands are parsed by [`parse_command`] and applied with
//! [`InteractiveSim::execute`]; [`InteractiveSim::run_repl`] wires both to a
//! reader and a writer so the CLI and tests drive the same loop.

use std::io::{BufRead, Write};

use crate::driver::{Simulation, StepResult};
use crate::error::SimError;

/// A debugger command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimCommand {
    /// Run `count` cycles.
    Step {
        /// Number of cycles.
        count: u64,
    },
    /// Run until the outcome is known or a breakpoint is reached.
    Run,
    /// Print committed values.
    Inspect {
        /// `Bus.Signal` paths, or bus names for every signal of a bus.
        signals: Vec<String>,
    },
    /// Stop `run` once this many cycles have committed.
    Break {
        /// Cycle count to stop at.
        cycle: u64,
    },
    /// Print a signal after every command.
    Watch {
        /// `Bus.Signal` path.
        signal: String,
    },
    /// Stop watching a signal.
    Unwatch {
        /// `Bus.Signal` path.
        signal: String,
    },
    /// Print the number of committed cycles.
    Cycle,
    /// List every signal with its type.
    Signals,
    /// Print the evaluation schedule.
    Schedule,
    /// Print run status and breakpoints.
    Status,
    /// Print the command list.
    Help,
    /// Leave the debugger.
    Quit,
}

/// Outcome of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Text to show.
    Output(String),
    /// The user asked to leave.
    Quit,
    /// `run` stopped at a breakpoint.
    BreakpointHit {
        /// Breakpoint number.
        bp_id: u32,
        /// Committed cycles at the stop.
        cycle: u64,
    },
    /// The run reached its outcome.
    Finished(String),
}

#[derive(Debug, Clone)]
struct Breakpoint {
    id: u32,
    cycle: u64,
}

/// Debugger state around a simulation.
pub struct InteractiveSim {
    sim: Simulation,
    breakpoints: Vec<Breakpoint>,
    next_bp_id: u32,
    watches: Vec<String>,
    history: Vec<String>,
}

impl InteractiveSim {
    /// Wraps a freshly built simulation.
    pub fn new(sim: Simulation) -> Self {
        Self {
            sim,
            breakpoints: Vec::new(),
            next_bp_id: 1,
            watches: Vec::new(),
            history: Vec::new(),
        }
    }

    /// The wrapped simulation.
    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Gives the simulation back, e.g. to build a report.
    pub fn into_simulation(self) -> Simulation {
        self.sim
    }

    /// Commands entered so far.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Applies one command.
    pub fn execute(&mut self, cmd: &SimCommand) -> CommandResult {
        match cmd {
            SimCommand::Step { count } => self.cmd_step(*count),
            SimCommand::Run => self.cmd_run(),
            SimCommand::Inspect { signals } => self.cmd_inspect(signals),
            SimCommand::Break { cycle } => self.cmd_break(*cycle),
            SimCommand::Watch { signal } => self.cmd_watch(signal),
            SimCommand::Unwatch { signal } => self.cmd_unwatch(signal),
            SimCommand::Cycle => CommandResult::Output(format!(
                "cycle {} of {}",
                self.sim.cycles_completed(),
                self.sim.max_cycles()
            )),
            SimCommand::Signals => self.cmd_signals(),
            SimCommand::Schedule => self.cmd_schedule(),
            SimCommand::Status => self.cmd_status(),
            SimCommand::Help => CommandResult::Output(HELP.trim_end().to_string()),
            SimCommand::Quit => CommandResult::Quit,
        }
    }

    /// Reads commands from `input` until `quit` or end of input.
    pub fn run_repl<R: BufRead, W: Write>(
        &mut self,
        input: &mut R,
        output: &mut W,
    ) -> Result<(), SimError> {
        writeln!(output, "Lockstep interactive simulator")?;
        writeln!(output, "Type 'help' for available commands.")?;
        writeln!(
            output,
            "{} processes, {} signals, budget {} cycles",
            self.sim.design().processes().len(),
            self.sim.design().signals().len(),
            self.sim.max_cycles()
        )?;
        writeln!(output)?;

        let mut line = String::new();
        loop {
            write!(output, "lockstep> ")?;
            output.flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                break;
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            self.history.push(trimmed.to_string());

            match parse_command(trimmed) {
                Ok(cmd) => match self.execute(&cmd) {
                    CommandResult::Output(text) => {
                        writeln!(output, "{text}")?;
                        self.print_watches(output)?;
                    }
                    CommandResult::Quit => {
                        writeln!(output, "Goodbye.")?;
                        break;
                    }
                    CommandResult::BreakpointHit { bp_id, cycle } => {
                        writeln!(output, "Breakpoint {bp_id} hit at cycle {cycle}")?;
                        self.print_watches(output)?;
                    }
                    CommandResult::Finished(status) => {
                        writeln!(output, "Run finished: {status}")?;
                        self.print_watches(output)?;
                    }
                },
                Err(msg) => writeln!(output, "Error: {msg}")?,
            }
        }
        Ok(())
    }

    fn print_watches<W: Write>(&self, output: &mut W) -> Result<(), SimError> {
        for path in &self.watches {
            writeln!(output, "  {path} = {}", self.render(path))?;
        }
        Ok(())
    }

    fn render(&self, path: &str) -> String {
        match self.sim.value(path) {
            Ok(Some(value)) => value.to_string(),
            Ok(None) => "uninitialized".to_string(),
            Err(err) => err.to_string(),
        }
    }

    fn finished(&self) -> CommandResult {
        let status = self
            .sim
            .status()
            .map_or_else(|| "running".to_string(), ToString::to_string);
        CommandResult::Finished(status)
    }

    fn cmd_step(&mut self, count: u64) -> CommandResult {
        for _ in 0..count {
            if self.sim.step() == StepResult::Done {
                return self.finished();
            }
        }
        CommandResult::Output(format!("cycle {}", self.sim.cycles_completed()))
    }

    fn cmd_run(&mut self) -> CommandResult {
        loop {
            if self.sim.step() == StepResult::Done {
                return self.finished();
            }
            let cycle = self.sim.cycles_completed();
            if let Some(bp) = self.breakpoints.iter().find(|bp| bp.cycle == cycle) {
                return CommandResult::BreakpointHit {
                    bp_id: bp.id,
                    cycle,
                };
            }
        }
    }

    fn cmd_inspect(&self, names: &[String]) -> CommandResult {
        let design = self.sim.design();
        let mut lines = Vec::new();
        for name in names {
            if name.contains('.') {
                lines.push(format!("{name} = {}", self.render(name)));
            } else if let Some(bus) = design.find_bus(name) {
                for &signal in &design.bus(bus).signals {
                    let path = design.signal_path(signal);
                    lines.push(format!("{path} = {}", self.render(&path)));
                }
            } else {
                lines.push(format!("{name}: no such bus"));
            }
        }
        CommandResult::Output(lines.join("\n"))
    }

    fn cmd_break(&mut self, cycle: u64) -> CommandResult {
        if cycle <= self.sim.cycles_completed() {
            return CommandResult::Output(format!(
                "cycle {cycle} has already committed"
            ));
        }
        let id = self.next_bp_id;
        self.next_bp_id += 1;
        self.breakpoints.push(Breakpoint { id, cycle });
        CommandResult::Output(format!("Breakpoint {id} at cycle {cycle}"))
    }

    fn cmd_watch(&mut self, signal: &str) -> CommandResult {
        if self.sim.design().find_signal(signal).is_none() {
            return CommandResult::Output(format!("unknown signal '{signal}'"));
        }
        if !self.watches.iter().any(|w| w == signal) {
            self.watches.push(signal.to_string());
        }
        CommandResult::Output(format!("Watching {signal}"))
    }

    fn cmd_unwatch(&mut self, signal: &str) -> CommandResult {
        let before = self.watches.len();
        self.watches.retain(|w| w != signal);
        if self.watches.len() == before {
            CommandResult::Output(format!("{signal} is not watched"))
        } else {
            CommandResult::Output(format!("Stopped watching {signal}"))
        }
    }

    fn cmd_signals(&self) -> CommandResult {
        let design = self.sim.design();
        let lines: Vec<String> = design
            .signals()
            .iter()
            .map(|(id, decl)| format!("{} : {}", design.signal_path(id), decl.ty))
            .collect();
        CommandResult::Output(lines.join("\n"))
    }

    fn cmd_schedule(&self) -> CommandResult {
        let design = self.sim.design();
        let schedule = self.sim.schedule();
        let mut lines = Vec::new();
        for (n, level) in schedule.levels().iter().enumerate() {
            let names: Vec<&str> = level.iter().map(|&p| design.process_name(p)).collect();
            lines.push(format!("level {n}: {}", names.join(", ")));
        }
        let driven: Vec<&str> = schedule
            .driven()
            .iter()
            .map(|&p| design.process_name(p))
            .collect();
        lines.push(format!("driven: {}", driven.join(", ")));
        CommandResult::Output(lines.join("\n"))
    }

    fn cmd_status(&self) -> CommandResult {
        let mut lines = vec![format!(
            "cycle {} of {}",
            self.sim.cycles_completed(),
            self.sim.max_cycles()
        )];
        match self.sim.status() {
            Some(status) => lines.push(format!("status: {status}")),
            None => lines.push(format!("suspended: {}", self.sim.suspended().join(", "))),
        }
        lines.push(format!("digest: {}", self.sim.digest()));
        for bp in &self.breakpoints {
            lines.push(format!("breakpoint {} at cycle {}", bp.id, bp.cycle));
        }
        CommandResult::Output(lines.join("\n"))
    }
}

const HELP: &str = "\
Commands:
  step [n]            s     run n cycles (default 1)
  run                 r     run until done or a breakpoint
  inspect <name>...   i     show committed values (Bus.Signal or Bus)
  break <cycle>       bp    stop 'run' once <cycle> cycles have committed
  watch <Bus.Signal>  w     print a signal after every command
  unwatch <Bus.Signal>      stop watching
  cycle               t     committed cycle count
  signals             sig   list signals
  schedule                  show evaluation levels
  status                    run status, digest, breakpoints
  help                h     this text
  quit                q     leave
";

/// Parses one line of debugger input.
pub fn parse_command(input: &str) -> Result<SimCommand, String> {
    let parts: Vec<&str> = input.split_whitespace().collect();
    let Some((head, args)) = parts.split_first() else {
        return Err("empty command".to_string());
    };

    let required = |what: &str| -> Result<String, String> {
        args.first()
            .map(|s| s.to_string())
            .ok_or_else(|| format!("{head} requires {what}"))
    };

    match head.to_lowercase().as_str() {
        "step" | "s" => {
            let count = match args.first() {
                Some(n) => n
                    .parse::<u64>()
                    .map_err(|_| format!("invalid cycle count '{n}'"))?,
                None => 1,
            };
            Ok(SimCommand::Step { count })
        }
        "run" | "r" => Ok(SimCommand::Run),
        "inspect" | "i" => {
            if args.is_empty() {
                return Err("inspect requires signal name(s)".to_string());
            }
            Ok(SimCommand::Inspect {
                signals: args.iter().map(|s| s.to_string()).collect(),
            })
        }
        "break" | "bp" => {
            let arg = required("a cycle number")?;
            let cycle = arg
                .strip_prefix('@')
                .unwrap_or(&arg)
                .parse::<u64>()
                .map_err(|_| format!("invalid breakpoint cycle '{arg}'"))?;
            Ok(SimCommand::Break { cycle })
        }
        "watch" | "w" => Ok(SimCommand::Watch {
            signal: required("a signal name")?,
        }),
        "unwatch" => Ok(SimCommand::Unwatch {
            signal: required("a signal name")?,
        }),
        "cycle" | "t" => Ok(SimCommand::Cycle),
        "signals" | "sig" => Ok(SimCommand::Signals),
        "schedule" => Ok(SimCommand::Schedule),
        "status" => Ok(SimCommand::Status),
        "help" | "h" => Ok(SimCommand::Help),
        "quit" | "q" => Ok(SimCommand::Quit),
        _ => Err(format!("unknown command: '{head}'")),
    }
}
