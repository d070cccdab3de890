//! Line-oriented console for the control panel
//!
//! Each input line is one command. Unrecognised input is tried as a hotkey,
//! so a layout's single-letter bindings work by typing the letter.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::{ControlError, ControlPanel};
use crate::output::PreviewReceiver;

const HELP: &str = "\
commands:
  list                          show toggles and sliders
  effects                       show the available effect types
  toggle <name>                 flip a toggle
  on <name> | off <name>        switch a toggle
  set <name> <param> <value>    move a slider
  reset                         return toggles to their defaults
  reload                        re-read the layout
  snapshot <path>               save the latest preview frame
  quit                          stop the pipeline
any other input is pressed as a hotkey";

/// What the console loop should do after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Console bound to a shared control panel
pub struct Console {
    panel: Arc<Mutex<ControlPanel>>,
    preview: Option<PreviewReceiver>,
}

impl Console {
    pub fn new(panel: Arc<Mutex<ControlPanel>>, preview: Option<PreviewReceiver>) -> Self {
        Self { panel, preview }
    }

    /// Read commands from `input` until `quit`, end of input, or the panel closes
    pub fn run(&mut self, input: impl BufRead, mut out: impl Write) -> io::Result<()> {
        writeln!(out, "{HELP}")?;
        for line in input.lines() {
            let line = line?;
            if self.execute(&line, &mut out)? == Flow::Quit || !self.panel.lock().is_open() {
                break;
            }
        }
        self.panel.lock().close();
        Ok(())
    }

    /// Run one command line
    pub fn execute(&mut self, line: &str, out: &mut impl Write) -> io::Result<Flow> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&command, rest)) = words.split_first() else {
            return Ok(Flow::Continue);
        };

        match (command, rest) {
            ("quit" | "exit", _) => return Ok(Flow::Quit),
            ("help", _) => writeln!(out, "{HELP}")?,
            ("list", _) => self.list(out)?,
            ("effects", _) => self.effects(out)?,
            ("reset", _) => self.panel.lock().reset_toggles(),
            ("reload", _) => {
                let result = self.panel.lock().reload();
                report(out, result)?;
            }
            ("toggle", [name @ ..]) if !name.is_empty() => {
                let name = name.join(" ");
                let result = self.with_toggle(&name, |panel, i| panel.toggle(i).map(|_| ()));
                report(out, result)?;
            }
            (state @ ("on" | "off"), [name @ ..]) if !name.is_empty() => {
                let name = name.join(" ");
                let on = state == "on";
                let result = self.with_toggle(&name, |panel, i| panel.switch_to(i, on));
                report(out, result)?;
            }
            ("set", [name @ .., variable, value]) if !name.is_empty() => {
                let Ok(value) = value.parse::<f64>() else {
                    writeln!(out, "not a number: {value}")?;
                    return Ok(Flow::Continue);
                };
                let name = name.join(" ");
                let mut applied = None;
                let result = self.with_toggle(&name, |panel, i| {
                    applied = Some(panel.set_parameter(i, variable, value)?);
                    Ok(())
                });
                if let Some(value) = applied {
                    writeln!(out, "{variable} = {value}")?;
                }
                report(out, result)?;
            }
            ("snapshot", [path]) => self.snapshot(PathBuf::from(path), out)?,
            _ => {
                if !self.panel.lock().press(line.trim()) {
                    writeln!(out, "unknown command or hotkey: {}", line.trim())?;
                }
            }
        }
        Ok(Flow::Continue)
    }

    fn with_toggle(
        &self,
        name: &str,
        action: impl FnOnce(&mut ControlPanel, usize) -> Result<(), ControlError>,
    ) -> Result<(), String> {
        let mut panel = self.panel.lock();
        let index = panel.find(name).ok_or_else(|| format!("no toggle named {name}"))?;
        action(&mut panel, index).map_err(|e| e.to_string())
    }

    fn list(&self, out: &mut impl Write) -> io::Result<()> {
        let panel = self.panel.lock();
        for toggle in panel.toggles() {
            let state = if toggle.is_enabled() { "on " } else { "off" };
            writeln!(out, "[{state}] {}", toggle.caption().replace('\n', " "))?;
            for slider in toggle.sliders() {
                writeln!(out, "        {}", slider.label())?;
            }
        }
        Ok(())
    }

    fn effects(&self, out: &mut impl Write) -> io::Result<()> {
        let panel = self.panel.lock();
        let registry = panel.registry();
        for category in registry.categories() {
            writeln!(out, "{category}:")?;
            for effect_type in registry.effects_in_category(category).unwrap_or_default() {
                let name = registry.display_name(effect_type).unwrap_or_default();
                writeln!(out, "  {effect_type:<14} {name}")?;
            }
        }
        Ok(())
    }

    fn snapshot(&self, path: PathBuf, out: &mut impl Write) -> io::Result<()> {
        let Some(preview) = &self.preview else {
            return writeln!(out, "preview is disabled");
        };
        match preview.latest(Duration::from_secs(1)) {
            Some(frame) => match frame.save(&path) {
                Ok(()) => writeln!(out, "saved {}", path.display()),
                Err(e) => writeln!(out, "could not save {}: {e}", path.display()),
            },
            None => writeln!(out, "no frame available"),
        }
    }
}

fn report<E: std::fmt::Display>(out: &mut impl Write, result: Result<(), E>) -> io::Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) => writeln!(out, "error: {e}"),
    }
}
