use anyhow::Result;

/// Stage lifecycle phase. Only the orchestrator writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Pending,
    Initializing,
    Initialized,
    Loading,
    Loaded,
    Processed,
    Ready,
    Running,
    Paused,
    Error,
    Disposing,
    Disposed,
}

/// What the orchestrator drives. Implemented by the stage/app; tests implement
/// it with a recorder.
pub trait PhaseHost {
    fn start_engine(&mut self) -> Result<()>;
    fn build_scene(&mut self) -> Result<()>;
    fn setup_lighting(&mut self) -> Result<()>;
    fn load_assets(&mut self) -> Result<()>;
    fn process_assets(&mut self) -> Result<()>;
    fn configure_shadows(&mut self) -> Result<()>;
    fn start_render_loop(&mut self) -> Result<()>;
    fn dispose(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Linear one-shot phase sequencer. Each phase's action runs exactly once;
/// phases without an entry (Running, Paused, ...) are terminal for the
/// stepper.
#[derive(Debug, Clone, Copy)]
pub struct Orchestrator {
    phase: Phase,
    engine_started: bool,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self { phase: Phase::Idle, engine_started: false }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    /// Runs the current phase's action and advances. Returns `false` when the
    /// phase has no entry.
    pub fn step(&mut self, host: &mut impl PhaseHost) -> Result<bool> {
        let next = match self.phase {
            Phase::Idle => {
                // The engine survives a second Idle pass untouched.
                if !self.engine_started {
                    host.start_engine()?;
                    self.engine_started = true;
                }
                Phase::Initializing
            }
            Phase::Initializing => {
                host.build_scene()?;
                Phase::Initialized
            }
            Phase::Initialized => {
                host.setup_lighting()?;
                Phase::Loading
            }
            Phase::Loading => {
                host.load_assets()?;
                Phase::Loaded
            }
            Phase::Loaded => {
                host.process_assets()?;
                Phase::Processed
            }
            Phase::Processed => {
                host.configure_shadows()?;
                Phase::Ready
            }
            Phase::Ready => {
                host.start_render_loop()?;
                Phase::Running
            }
            Phase::Disposing => {
                host.dispose()?;
                Phase::Disposed
            }
            _ => return Ok(false),
        };
        eprintln!("[lifecycle] {:?} -> {:?}", self.phase, next);
        self.phase = next;
        Ok(true)
    }

    /// Steps until the stepper parks (normally at Running).
    pub fn drive(&mut self, host: &mut impl PhaseHost) -> Result<()> {
        while self.step(host)? {}
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.phase == Phase::Running {
            self.phase = Phase::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.phase == Phase::Paused {
            self.phase = Phase::Running;
        }
    }

    /// Teardown entry point; `drive` then runs the dispose action.
    pub fn begin_disposal(&mut self) {
        if !matches!(self.phase, Phase::Disposing | Phase::Disposed) {
            self.phase = Phase::Disposing;
        }
    }
}
