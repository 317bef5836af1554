// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A toy lockstep run: one world timeline and one region timeline, a
//! scripted command stream with wire-encoded payloads, and a catch-up at
//! the end. Run with `RUST_LOG=debug` to watch the loop.

use anyhow::{bail, Context, Result};
use cadence_control::{CommandExecutor, NoHooks, Scheduler};
use cadence_core::{
    CommandFault, CommandKind, EngineConfig, IssuerId, ScheduledCommand, SimulationFault, Tick,
    TimeSpeed, Timeline, TimelineContext, TimelineDriver, TimelineId,
};
use cadence_wire::{
    ByteCursor, Codec, CodecOutcome, RegistrationKind, SerializationMismatch, SyncRegistry,
    SyncValue, SyncWorker, TypeCatalog, TypeDesc, TypeTag,
};
use std::any::Any;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const KIND_SET_SPEED: CommandKind = CommandKind(1);
const REGION: TimelineId = TimelineId(1);

const CONFIG_JSON: &str = r#"{
    "ticks_per_second": 240.0,
    "buffer_target_ticks": 6,
    "catch_up_budget_ms": 25,
    "checksum_interval_ticks": 60
}"#;

const SPEED_ARGS_DESC: TypeDesc = TypeDesc::leaf("SpeedArgs", TypeTag(1));

/// Argument payload of the set-speed command.
#[derive(Debug, Default)]
struct SpeedArgs {
    speed: u8,
}

impl SpeedArgs {
    fn to_speed(&self) -> Option<TimeSpeed> {
        match self.speed {
            0 => Some(TimeSpeed::Paused),
            1 => Some(TimeSpeed::Normal),
            2 => Some(TimeSpeed::Fast),
            3 => Some(TimeSpeed::Superfast),
            _ => None,
        }
    }
}

impl SyncValue for SpeedArgs {
    fn desc(&self) -> &'static TypeDesc {
        &SPEED_ARGS_DESC
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct SpeedArgsCodec;

impl Codec for SpeedArgsCodec {
    fn sync(
        &self,
        worker: &mut SyncWorker<'_>,
        value: &mut dyn SyncValue,
    ) -> Result<CodecOutcome, SerializationMismatch> {
        let Some(args) = value.as_any_mut().downcast_mut::<SpeedArgs>() else {
            return Ok(CodecOutcome::NotHandled);
        };
        worker.bind_u8(&mut args.speed)?;
        Ok(CodecOutcome::Handled)
    }
}

/// Wanders a position around with the timeline's random stream.
struct WanderDriver {
    position: i64,
}

impl TimelineDriver for WanderDriver {
    fn advance(&mut self, ctx: &mut TimelineContext<'_>) -> Result<(), SimulationFault> {
        let step = (ctx.rng.next_int(3) as i64) - 1;
        self.position += step;
        Ok(())
    }

    fn digest(&self) -> u64 {
        self.position as u64
    }
}

/// Decodes each command's payload through the shared registry.
struct WireExecutor {
    registry: Arc<SyncRegistry>,
    catalog: Arc<TypeCatalog>,
}

impl CommandExecutor for WireExecutor {
    fn execute(
        &mut self,
        command: &ScheduledCommand,
        timeline: &mut Timeline,
    ) -> Result<(), CommandFault> {
        let fault = |message: String| CommandFault {
            timeline: command.target,
            kind: command.kind,
            due: command.due,
            message,
        };

        match command.kind {
            KIND_SET_SPEED => {
                let mut cursor = ByteCursor::from_bytes(command.payload.clone());
                let mut args = SpeedArgs::default();
                SyncWorker::reader(&mut cursor, &self.registry, &self.catalog)
                    .sync_value(&mut args)
                    .map_err(|e| fault(e.to_string()))?;
                let speed = args
                    .to_speed()
                    .ok_or_else(|| fault(format!("invalid speed {}", args.speed)))?;
                log::info!("{} -> {:?} at {}", timeline.id(), speed, command.due);
                timeline.set_speed(speed);
                Ok(())
            }
            other => Err(fault(format!("unknown command kind {}", other.0))),
        }
    }
}

fn encode_speed(
    registry: &SyncRegistry,
    catalog: &TypeCatalog,
    speed: u8,
) -> Result<Vec<u8>, SerializationMismatch> {
    let mut cursor = ByteCursor::new();
    let mut args = SpeedArgs { speed };
    SyncWorker::writer(&mut cursor, registry, catalog).sync_value(&mut args)?;
    Ok(cursor.into_bytes())
}

fn main() -> Result<()> {
    env_logger::init();

    let config =
        EngineConfig::from_json_str(CONFIG_JSON).context("parsing embedded engine config")?;
    log::info!("Sandbox starting at {} tps", config.ticks_per_second);

    let mut registry = SyncRegistry::new();
    registry.register(
        &SPEED_ARGS_DESC,
        Arc::new(SpeedArgsCodec),
        RegistrationKind::Explicit,
    );
    registry.register_constructor(&SPEED_ARGS_DESC, || Box::<SpeedArgs>::default());
    let mut catalog = TypeCatalog::new();
    catalog.register(&SPEED_ARGS_DESC);
    let registry = Arc::new(registry);
    let catalog = Arc::new(catalog);

    let executor = WireExecutor {
        registry: registry.clone(),
        catalog: catalog.clone(),
    };
    let mut scheduler = Scheduler::new(config, Box::new(executor), Box::new(NoHooks));
    scheduler.add_timeline(TimelineId::WORLD, 0xCAFE, Box::new(WanderDriver { position: 0 }));
    scheduler.add_timeline(REGION, 0xF00D, Box::new(WanderDriver { position: 0 }));
    scheduler.start();

    // Scripted command stream: the world goes Fast at tick 30, the region
    // pauses at tick 60 and resumes at tick 90.
    let sender = scheduler.command_sender();
    let script = [
        (TimelineId::WORLD, 30u64, 2u8),
        (REGION, 60, 0),
        (REGION, 90, 1),
    ];
    for (target, due, speed) in script {
        sender.submit(ScheduledCommand {
            target,
            due: Tick::new(due),
            issuer: IssuerId(1),
            kind: KIND_SET_SPEED,
            payload: encode_speed(&registry, &catalog, speed)
                .map_err(|e| anyhow::anyhow!("encoding speed payload: {e}"))?,
        });
    }

    // Paced run to tick 120.
    while scheduler.current_tick() < Tick::new(120) {
        scheduler
            .pump(Instant::now())
            .map_err(|e| anyhow::anyhow!("pump failed: {e}"))?;
        thread::sleep(Duration::from_millis(2));
    }
    let world = scheduler
        .timeline(TimelineId::WORLD)
        .context("world timeline missing")?;
    let region = scheduler.timeline(REGION).context("region timeline missing")?;
    println!(
        "tick {}: world elapsed {}, region elapsed {}, digest {:#018x}",
        scheduler.current_tick(),
        world.elapsed_ticks(),
        region.elapsed_ticks(),
        scheduler.state_digest()
    );

    // Fast-forward the rest of the way.
    scheduler.request_catch_up_to(Tick::new(600));
    let catch_up_started = Instant::now();
    while scheduler.current_tick() < Tick::new(600) {
        scheduler
            .pump(Instant::now())
            .map_err(|e| anyhow::anyhow!("catch-up pump failed: {e}"))?;
        if catch_up_started.elapsed() > Duration::from_secs(10) {
            bail!("catch-up made no progress");
        }
    }
    println!(
        "caught up to {} (digest {:#018x})",
        scheduler.current_tick(),
        scheduler.state_digest()
    );
    Ok(())
}
