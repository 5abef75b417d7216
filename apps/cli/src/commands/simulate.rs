//! 仿真飞行命令
//!
//! CLI 是核心之外的驱动：它按固定步长调用 [`StateManager::advance`]，
//! 核心本身从不自行调度节拍。
//!
//! 运行期间有三类输出者共享同一个控制台锁：
//! - 阶段播报器（`PhaseReporter`，作为状态观察者运行在更新线程上）
//! - 起飞监视线程（阻塞在 `wait_for_condition` 上）
//! - 主线程的结束摘要

use anyhow::{Context, Result};
use clap::Args;
use flightdeck_sdk::driver::{
    InstanceLock, InstanceLocked, LockWrapper, RecordedState, SharedLock,
};
use flightdeck_sdk::physics::KMH_PER_MS;
use flightdeck_sdk::{
    CallbackError, FlightPhase, FlightState, LandingOutcome, ManeuverAnalysis, PhysicsEngine,
    SharedFlightObserver, SimConfig, SnapshotRecorder, StateCallback, StateManager,
};
use parking_lot::Mutex;
use serde::Serialize;
use spin_sleep::SpinSleeper;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// 下降指令的目标速度（km/h）
const DESCENT_SPEED: f64 = 40.0;

/// 下降指令的目标倾角（°）
const DESCENT_INCLINATION: f64 = -30.0;

/// 录制通道容量（主循环每步清空）
const RECORD_CHANNEL_CAPACITY: usize = 1024;

/// 监视线程检查结束标志的周期
const MONITOR_POLL: Duration = Duration::from_millis(100);

const TRACK: LockWrapper<InstanceLock> = LockWrapper::new(InstanceLock);

/// 仿真命令参数
#[derive(Args, Debug)]
pub struct SimulateCommand {
    /// 仿真配置文件（TOML）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 最多积分步数
    #[arg(short = 'n', long, default_value_t = 5000)]
    pub steps: u64,

    /// 初始加速指令（km/h）
    #[arg(long, default_value_t = 120.0, allow_negative_numbers = true)]
    pub speed: f64,

    /// 初始转向指令（°）
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub turn: f64,

    /// 初始抬头指令（°）
    #[arg(long, default_value_t = 20.0, allow_negative_numbers = true)]
    pub climb: f64,

    /// 到达该高度（m）后下令减速下降
    #[arg(long)]
    pub descend_at: Option<f64>,

    /// 按真实时间节拍推进（每步休眠 dt）
    #[arg(long)]
    pub realtime: bool,

    /// 以 JSON 输出结束摘要
    #[arg(long)]
    pub json: bool,

    /// 将轨迹录制为 JSON 文件
    #[arg(long)]
    pub record: Option<PathBuf>,
}

/// 飞行结束的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ending {
    Landed,
    Crashed,
    StepLimit,
    Interrupted,
}

impl From<LandingOutcome> for Ending {
    fn from(outcome: LandingOutcome) -> Self {
        match outcome {
            LandingOutcome::Safe => Ending::Landed,
            LandingOutcome::Crashed => Ending::Crashed,
        }
    }
}

/// 结束摘要
#[derive(Debug, Serialize)]
pub struct FlightSummary {
    pub ending: Ending,
    pub steps: u64,
    pub liftoff: bool,
    pub state: FlightState,
    pub analysis: ManeuverAnalysis,
    pub description: String,
    pub recorded: usize,
    pub dropped: u64,
}

/// 控制台输出（所有输出者共享一把锁，行不会交错）
#[derive(Debug)]
struct Console {
    lines: usize,
    to_stderr: bool,
}

impl Console {
    fn line(&mut self, text: &str) {
        if self.to_stderr {
            eprintln!("{text}");
        } else {
            println!("{text}");
        }
        self.lines += 1;
    }
}

/// 阶段播报器
///
/// 注册在共享观测器之后，每次状态更新读取观测器的当前阶段，
/// 阶段变化时经由控制台锁打印一行。
struct PhaseReporter {
    last: Mutex<Option<FlightPhase>>,
    observer: Arc<SharedFlightObserver>,
    console: LockWrapper<SharedLock<Console>>,
}

impl InstanceLocked for PhaseReporter {
    type Data = Option<FlightPhase>;

    fn instance_lock(&self) -> Option<&Mutex<Option<FlightPhase>>> {
        Some(&self.last)
    }
}

impl PhaseReporter {
    fn new(observer: Arc<SharedFlightObserver>, console: SharedLock<Console>) -> Self {
        Self {
            last: Mutex::new(None),
            observer,
            console: LockWrapper::new(console),
        }
    }
}

impl StateCallback for PhaseReporter {
    fn on_state_changed(&self, state: &FlightState) -> Result<(), CallbackError> {
        let phase = self
            .observer
            .phase()
            .map_err(|e| CallbackError::new(e.to_string()))?;

        let transition = TRACK
            .run(self, |last| {
                let previous = last.replace(phase);
                (previous != Some(phase)).then_some(previous)
            })
            .map_err(|e| CallbackError::new(e.to_string()))?;

        if let Some(previous) = transition {
            let text = match previous {
                Some(previous) => format!(
                    "t={:>7.1}s  {previous} -> {phase}  (z {:.1} m, {:.1} km/h)",
                    state.ftime,
                    state.z,
                    state.vel * KMH_PER_MS
                ),
                None => format!("t={:>7.1}s  {phase}", state.ftime),
            };
            self.console
                .run(self, |console| console.line(&text))
                .map_err(|e| CallbackError::new(e.to_string()))?;
        }
        Ok(())
    }
}

impl SimulateCommand {
    pub fn execute(self) -> Result<()> {
        let stop = Arc::new(AtomicBool::new(false));
        {
            let stop = Arc::clone(&stop);
            ctrlc::set_handler(move || {
                stop.store(true, Ordering::SeqCst);
            })
            .context("failed to install Ctrl-C handler")?;
        }

        let summary = self.run(&stop)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            print_summary(&summary);
        }
        Ok(())
    }

    fn load_config(&self) -> Result<SimConfig> {
        match &self.config {
            Some(path) => SimConfig::load_from_file(path)
                .with_context(|| format!("failed to load {}", path.display())),
            None => Ok(SimConfig::default()),
        }
    }

    /// 运行一次飞行，直到着陆/坠毁、步数用尽或 `stop` 被置位
    pub fn run(&self, stop: &AtomicBool) -> Result<FlightSummary> {
        let config = self.load_config()?;
        let engine = PhysicsEngine::new(&config)?;
        let manager = Arc::new(StateManager::new());
        let observer = Arc::new(SharedFlightObserver::new(config.observer.clone())?);
        let console = SharedLock::new(Arc::new(Mutex::new(Console {
            lines: 0,
            to_stderr: self.json,
        })));

        // 观测器必须先于播报器收到通知
        manager.register_observer(observer.clone());
        manager.register_observer(Arc::new(PhaseReporter::new(
            observer.clone(),
            console.clone(),
        )));

        let recording = self.record.as_ref().map(|_| {
            let (recorder, rx) = SnapshotRecorder::new(RECORD_CHANNEL_CAPACITY);
            let recorder = Arc::new(recorder);
            manager.register_observer(recorder.clone());
            (recorder, rx)
        });

        let finished = Arc::new(AtomicBool::new(false));
        let monitor = spawn_liftoff_monitor(
            Arc::clone(&manager),
            LockWrapper::new(console),
            Arc::clone(&finished),
        );

        info!(
            speed = self.speed,
            turn = self.turn,
            climb = self.climb,
            "Starting flight"
        );
        manager.update_state(|s| s.with_command(self.speed, self.turn, self.climb));

        let period = Duration::from_secs_f64(config.physics.dt);
        let sleeper = SpinSleeper::default();
        let mut trajectory: Vec<RecordedState> = Vec::new();
        let mut descending = false;
        let mut steps = 0u64;

        let ending = loop {
            if stop.load(Ordering::SeqCst) {
                warn!(steps, "Flight interrupted");
                break Ending::Interrupted;
            }
            if steps >= self.steps {
                break Ending::StepLimit;
            }

            let outcome = manager.advance(&engine);
            steps += 1;

            if let Some((_, rx)) = &recording {
                trajectory.extend(rx.try_iter());
            }

            if let Some(touchdown) = outcome.touchdown() {
                break touchdown.into();
            }

            if let Some(altitude) = self.descend_at
                && !descending
                && outcome.state.z >= altitude
            {
                descending = true;
                info!(z = outcome.state.z, "Starting descent");
                manager.update_state(|s| {
                    s.with_pending(DESCENT_SPEED - s.v, 0.0, DESCENT_INCLINATION - s.i)
                });
            }

            if self.realtime {
                sleeper.sleep(period);
            }
        };

        finished.store(true, Ordering::SeqCst);
        let liftoff = monitor
            .join()
            .map_err(|_| anyhow::anyhow!("liftoff monitor thread panicked"))?;

        let mut dropped = 0;
        if let Some((recorder, rx)) = recording {
            trajectory.extend(rx.try_iter());
            dropped = recorder.dropped();
            if dropped > 0 {
                warn!(dropped, "Recorder dropped snapshots");
            }
        }
        if let Some(path) = &self.record {
            write_trajectory(path, &trajectory)?;
            info!(path = %path.display(), snapshots = trajectory.len(), "Trajectory saved");
        }

        Ok(FlightSummary {
            ending,
            steps,
            liftoff,
            state: manager.get_snapshot(),
            analysis: observer.analyze()?,
            description: observer.get_maneuver_description()?,
            recorded: trajectory.len(),
            dropped,
        })
    }
}

/// 起飞监视线程：阻塞等待首次离地，飞行结束仍未离地则返回 `false`
fn spawn_liftoff_monitor(
    manager: Arc<StateManager>,
    console: LockWrapper<SharedLock<Console>>,
    finished: Arc<AtomicBool>,
) -> thread::JoinHandle<bool> {
    thread::spawn(move || {
        loop {
            // 空中计时只增不减：即使错过离地瞬间也能判定
            if manager.wait_for_condition(|s| s.ftime > 0.0, Some(MONITOR_POLL)) {
                let state = manager.get_snapshot();
                let text = format!("t={:>7.1}s  liftoff", state.ftime);
                if let Err(e) = console.run(&(), |console| console.line(&text)) {
                    warn!("Liftoff report failed: {}", e);
                }
                return true;
            }
            if finished.load(Ordering::SeqCst) {
                return false;
            }
        }
    })
}

fn write_trajectory(path: &Path, trajectory: &[RecordedState]) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, trajectory)?;
    writer.flush()?;
    Ok(())
}

fn print_summary(summary: &FlightSummary) {
    let state = &summary.state;
    let headline = match summary.ending {
        Ending::Landed => "✅ Landed safely",
        Ending::Crashed => "💥 Crashed",
        Ending::StepLimit => "⏱️  Step limit reached",
        Ending::Interrupted => "⚠️  Interrupted",
    };

    println!();
    println!("{headline} after {} steps ({:.1} s)", summary.steps, state.ftime);
    println!(
        "   position: ({:.1}, {:.1}, {:.1}) m",
        state.x, state.y, state.z
    );
    println!(
        "   speed: {:.1} km/h, heading {:.1}°, inclination {:.1}°",
        state.v, state.d, state.i
    );
    println!("   distance: {:.1} m", state.dist);
    println!("   maneuver: {}", summary.description);
    if summary.recorded > 0 {
        println!("   recorded: {} snapshots", summary.recorded);
    }
}
