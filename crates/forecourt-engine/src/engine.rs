//! # Simulation Engine
//!
//! Advances physical pump/tank state once per clock tick and applies
//! operator commands immediately between ticks.
//!
//! ## Pump State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Pump State Machine                                 │
//! │                                                                         │
//! │            authorize(pump, nozzle, preset, price)                       │
//! │   ┌──────┐ ─────────────────────────────► ┌────────────┐               │
//! │   │ Idle │                                │ Authorized │               │
//! │   └──────┘ ◄───────── stop ────────────── └─────┬──────┘               │
//! │      ▲                                          │ dwell elapsed        │
//! │      │                                          ▼                       │
//! │      │  stop                            ┌────────────┐                 │
//! │      │  (finalize)                      │  Filling   │◄─┐ each tick:   │
//! │      │                                  └─────┬──────┘──┘ volume +=    │
//! │      │                                        │           flow rate    │
//! │      │         ceiling / preset / stop        │                        │
//! │   ┌──┴───────────────┐ ◄──────────────────────┘                        │
//! │   │ EndOfTransaction │  (transaction id assigned at Filling start;     │
//! │   └──────────────────┘   record + completion event emitted here)       │
//! │                                                                         │
//! │  COMMANDS are applied synchronously and atomically: each command       │
//! │  fully mutates the model and emits its resulting event before          │
//! │  returning. Rejected commands (InvalidTarget / InvalidParameter)       │
//! │  mutate nothing and emit nothing.                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use forecourt_core::{
    CommandError, CommandResult, ForecourtEvent, FuelingTransaction, Preset, Pump, PumpState,
    StatusSnapshot, Tank,
};

use crate::config::ForecourtConfig;
use crate::distributor::EventDistributor;
use crate::error::{EngineError, EngineResult};
use crate::model::ForecourtModel;

/// Tolerance when checking a preset boundary against accumulated floats.
const PRESET_EPSILON: f64 = 1e-9;

// =============================================================================
// Engine Commands
// =============================================================================

/// Commands accepted on the engine's serialized command channel.
#[derive(Debug)]
enum EngineCommand {
    Authorize {
        pump: u32,
        nozzle: u32,
        preset: Option<Preset>,
        price: f64,
        user: String,
        reply: oneshot::Sender<CommandResult<Pump>>,
    },
    Stop {
        pump: u32,
        reply: oneshot::Sender<CommandResult<Pump>>,
    },
    SetTankLevel {
        tank: u32,
        volume: f64,
        reply: oneshot::Sender<CommandResult<Tank>>,
    },
    PumpStatuses {
        reply: oneshot::Sender<BTreeMap<u32, Pump>>,
    },
    TankStatuses {
        reply: oneshot::Sender<BTreeMap<u32, Tank>>,
    },
    Snapshot {
        reply: oneshot::Sender<StatusSnapshot>,
    },
}

// =============================================================================
// Engine Handle
// =============================================================================

/// Handle for interacting with a running engine from other components.
///
/// Every call is routed over the command channel onto the engine's single
/// task, so callers observe fully serialized state.
#[derive(Clone)]
pub struct EngineHandle {
    command_tx: mpsc::Sender<EngineCommand>,
    shutdown_tx: mpsc::Sender<()>,
}

impl EngineHandle {
    /// Authorizes a pump for fueling.
    pub async fn authorize(
        &self,
        pump: u32,
        nozzle: u32,
        preset: Option<Preset>,
        price: f64,
        user: String,
    ) -> EngineResult<Pump> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(EngineCommand::Authorize {
                pump,
                nozzle,
                preset,
                price,
                user,
                reply,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        rx.await
            .map_err(|_| EngineError::ChannelClosed)?
            .map_err(EngineError::from)
    }

    /// Stops a pump (completes a running transaction or finalizes/clears).
    pub async fn stop(&self, pump: u32) -> EngineResult<Pump> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(EngineCommand::Stop { pump, reply })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        rx.await
            .map_err(|_| EngineError::ChannelClosed)?
            .map_err(EngineError::from)
    }

    /// Operator override of a tank's product level.
    pub async fn set_tank_level(&self, tank: u32, volume: f64) -> EngineResult<Tank> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(EngineCommand::SetTankLevel {
                tank,
                volume,
                reply,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        rx.await
            .map_err(|_| EngineError::ChannelClosed)?
            .map_err(EngineError::from)
    }

    /// Pump number -> pump mapping.
    pub async fn pump_statuses(&self) -> EngineResult<BTreeMap<u32, Pump>> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(EngineCommand::PumpStatuses { reply })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Tank number -> tank mapping.
    pub async fn tank_statuses(&self) -> EngineResult<BTreeMap<u32, Tank>> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(EngineCommand::TankStatuses { reply })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// On-demand, point-in-time copy of the full model (the pull edge).
    pub async fn snapshot(&self) -> EngineResult<StatusSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(EngineCommand::Snapshot { reply })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Stops the engine task.
    pub async fn shutdown(&self) -> EngineResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }
}

// =============================================================================
// Forecourt Engine
// =============================================================================

/// The forecourt simulation engine.
///
/// `tick()` and the command methods are plain synchronous functions so the
/// physics are unit-testable without a runtime; [`ForecourtEngine::spawn`]
/// wraps them in the single-task actor loop that provides the serialization
/// guarantee.
pub struct ForecourtEngine {
    config: ForecourtConfig,
    model: ForecourtModel,
    distributor: EventDistributor,
    /// Completed transactions are handed to the recorder over this bounded
    /// channel with `try_send` - a full channel drops the hand-off (logged)
    /// rather than blocking a tick.
    recorder_tx: Option<mpsc::Sender<FuelingTransaction>>,
}

impl ForecourtEngine {
    /// Creates a new engine over a freshly initialized model.
    pub fn new(
        config: ForecourtConfig,
        distributor: EventDistributor,
        recorder_tx: Option<mpsc::Sender<FuelingTransaction>>,
    ) -> Self {
        let model = ForecourtModel::new(&config);
        ForecourtEngine {
            config,
            model,
            distributor,
            recorder_tx,
        }
    }

    /// Spawns the engine actor and returns its handle.
    pub fn spawn(
        config: ForecourtConfig,
        distributor: EventDistributor,
        recorder_tx: Option<mpsc::Sender<FuelingTransaction>>,
    ) -> EngineHandle {
        let engine = ForecourtEngine::new(config, distributor, recorder_tx);
        let (command_tx, command_rx) = mpsc::channel(64);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        tokio::spawn(engine.run(command_rx, shutdown_rx));

        EngineHandle {
            command_tx,
            shutdown_tx,
        }
    }

    /// Main engine loop: one task, strictly serialized ticks and commands.
    ///
    /// `select!` runs exactly one branch to completion per iteration, so a
    /// command always finishes before the next tick begins and at most one
    /// tick is ever in flight. `MissedTickBehavior::Delay` keeps an
    /// overlong tick from bursting.
    async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<EngineCommand>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        info!(
            period_ms = self.config.tick_interval_ms,
            pumps = self.model.pump_numbers().len(),
            "Forecourt engine starting"
        );

        let mut clock = interval(Duration::from_millis(self.config.tick_interval_ms));
        clock.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = clock.tick() => {
                    self.tick();
                }

                Some(command) = command_rx.recv() => {
                    self.apply(command);
                }

                _ = shutdown_rx.recv() => {
                    info!("Forecourt engine shutting down");
                    break;
                }
            }
        }
    }

    /// Applies one command, replying synchronously. A dropped reply
    /// receiver is not our problem.
    fn apply(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Authorize {
                pump,
                nozzle,
                preset,
                price,
                user,
                reply,
            } => {
                let _ = reply.send(self.authorize(pump, nozzle, preset, price, user));
            }
            EngineCommand::Stop { pump, reply } => {
                let _ = reply.send(self.stop(pump));
            }
            EngineCommand::SetTankLevel {
                tank,
                volume,
                reply,
            } => {
                let _ = reply.send(self.set_tank_level(tank, volume));
            }
            EngineCommand::PumpStatuses { reply } => {
                let _ = reply.send(self.model.pump_statuses());
            }
            EngineCommand::TankStatuses { reply } => {
                let _ = reply.send(self.model.tank_statuses());
            }
            EngineCommand::Snapshot { reply } => {
                let _ = reply.send(self.model.snapshot());
            }
        }
    }

    // =========================================================================
    // Tick Physics
    // =========================================================================

    /// Advances simulated time by one tick.
    ///
    /// All implicit transitions (dwell-period auto-start, auto-stop at the
    /// volume ceiling, preset completion) are guard conditions evaluated
    /// here, never separate scheduled callbacks, so they stay serialized
    /// with command application.
    pub fn tick(&mut self) {
        for number in self.model.pump_numbers() {
            let status = match self.model.pump(number) {
                Some(pump) => pump.status,
                None => continue,
            };
            match status {
                PumpState::Authorized => self.tick_authorized(number),
                PumpState::Filling => self.tick_filling(number),
                PumpState::Idle | PumpState::EndOfTransaction => {}
            }
        }
    }

    /// Authorized pumps wait out the dwell period before fuel flows.
    fn tick_authorized(&mut self, number: u32) {
        if self.model.advance_dwell(number) < self.config.dwell_ticks {
            return;
        }

        // Dwell elapsed: the nozzle is "lifted". The marker is cleared
        // exactly once, at this transition.
        self.model.clear_dwell(number);
        let transaction_id = self.model.allocate_transaction_id();
        if let Some(pump) = self.model.pump_mut(number) {
            pump.status = PumpState::Filling;
            pump.transaction_id = transaction_id;
            debug!(pump = number, transaction_id, "Fueling started");
        }
        self.emit_pump(number);
    }

    /// One tick of dispensing: pump gains volume, the supplying tank loses
    /// the same volume, completion guards fire when met.
    fn tick_filling(&mut self, number: u32) {
        let (price, volume) = match self.model.pump(number) {
            Some(pump) => (pump.price, pump.volume),
            None => return,
        };
        let preset = self.model.preset(number);

        // Cap the flow step at the preset boundary so the final tick lands
        // exactly on the target instead of overshooting.
        let mut step = self.config.flow_rate;
        if let Some(preset) = preset {
            let target_volume = match preset {
                Preset::Volume(v) => v,
                Preset::Amount(a) => a / price,
            };
            step = step.min((target_volume - volume).max(0.0));
        }

        // The draining tank loses what the pump dispenses. All pumps draw
        // from the primary tank; see ForecourtModel::primary_tank_number.
        let tank_number = self.model.primary_tank_number();
        let drained = match tank_number.and_then(|t| self.model.tank_mut(t)) {
            Some(tank) => tank.drain(step),
            None => step,
        };

        let mut completed = false;
        let mut tank_dry = false;
        if let Some(pump) = self.model.pump_mut(number) {
            pump.volume += drained;
            pump.amount = pump.volume * pump.price;

            if let Some(preset) = preset {
                if preset.is_reached(pump.volume + PRESET_EPSILON, pump.amount + PRESET_EPSILON) {
                    // Clamp to the boundary; amount stays volume * price
                    // exactly, rounding happens only at presentation.
                    pump.volume = match preset {
                        Preset::Volume(v) => v,
                        Preset::Amount(a) => a / pump.price,
                    };
                    pump.amount = pump.volume * pump.price;
                    completed = true;
                }
            }

            if pump.volume >= self.config.auto_stop_volume {
                completed = true;
            }

            if drained <= 0.0 && step > 0.0 {
                // Supplying tank ran dry mid-transaction.
                tank_dry = true;
                completed = true;
            }
        }

        if tank_dry {
            warn!(pump = number, "Supplying tank is dry, stopping transaction");
        }

        if let Some(tank_number) = tank_number {
            if drained > 0.0 {
                self.emit_tank(tank_number);
            }
        }

        if completed {
            self.complete_transaction(number);
        } else {
            self.emit_pump(number);
        }
    }

    /// Moves a filling pump into `EndOfTransaction`, emits the completion
    /// event and hands the record to the recorder - all in the same step.
    fn complete_transaction(&mut self, number: u32) {
        self.model.clear_preset(number);

        let record = match self.model.pump_mut(number) {
            Some(pump) => {
                pump.status = PumpState::EndOfTransaction;
                FuelingTransaction::from_pump(pump, Utc::now())
            }
            None => return,
        };

        info!(
            pump = number,
            transaction_id = record.transaction_id,
            volume = record.volume,
            amount = record.display_amount(),
            "Transaction completed"
        );

        self.emit_pump(number);
        self.distributor.publish(ForecourtEvent::Transaction {
            data: record.clone(),
        });

        if let Some(tx) = &self.recorder_tx {
            if tx.try_send(record).is_err() {
                // Recorder backlogged or gone. Forecourt responsiveness
                // wins over write durability; the reconciliation pass
                // picks unsynced records up later.
                warn!(pump = number, "Recorder channel full, dropping hand-off");
            }
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// `authorize(pump, nozzle, preset, price)` - Idle -> Authorized.
    ///
    /// Rejections (no mutation, no event): unknown pump (`InvalidTarget`),
    /// non-positive price or preset value, bad nozzle, pump not idle
    /// (`InvalidParameter`).
    pub fn authorize(
        &mut self,
        pump_number: u32,
        nozzle: u32,
        preset: Option<Preset>,
        price: f64,
        user: String,
    ) -> CommandResult<Pump> {
        let nozzle_count = self
            .config
            .pumps
            .iter()
            .find(|p| p.number == pump_number)
            .map(|p| p.nozzles);

        let Some(pump) = self.model.pump(pump_number) else {
            return Err(CommandError::unknown_pump(pump_number));
        };

        if price <= 0.0 {
            return Err(CommandError::invalid_parameter("price must be positive"));
        }
        if let Some(preset) = preset {
            if preset.value() <= 0.0 {
                return Err(CommandError::invalid_parameter(
                    "preset value must be positive",
                ));
            }
        }
        if nozzle == 0 || nozzle_count.is_some_and(|count| nozzle > count) {
            return Err(CommandError::invalid_parameter(format!(
                "nozzle {nozzle} does not exist on pump {pump_number}"
            )));
        }
        if pump.status != PumpState::Idle {
            return Err(CommandError::invalid_parameter(format!(
                "pump {pump_number} is not idle"
            )));
        }

        if let Some(pump) = self.model.pump_mut(pump_number) {
            pump.status = PumpState::Authorized;
            pump.nozzle = nozzle;
            pump.price = price;
            pump.user = Some(user);
            // The only place volume/amount ever reset.
            pump.volume = 0.0;
            pump.amount = 0.0;
            pump.transaction_id = 0;
        }
        self.model.start_dwell(pump_number);
        self.model.set_preset(pump_number, preset);

        debug!(pump = pump_number, nozzle, price, "Pump authorized");
        self.emit_pump(pump_number);

        self.model
            .pump(pump_number)
            .cloned()
            .ok_or_else(|| CommandError::unknown_pump(pump_number))
    }

    /// `stop(pump)` - completes a running transaction, cancels a pending
    /// authorization, or finalizes a completed one. Idempotent on an idle
    /// pump: no transaction, no mutation, no event.
    pub fn stop(&mut self, pump_number: u32) -> CommandResult<Pump> {
        let status = match self.model.pump(pump_number) {
            Some(pump) => pump.status,
            None => return Err(CommandError::unknown_pump(pump_number)),
        };

        match status {
            PumpState::Filling => {
                // Operator stop mid-fuel: a completion condition like any
                // other.
                self.complete_transaction(pump_number);
            }
            PumpState::Authorized => {
                // Cancelled before fuel flowed: no transaction is created.
                self.model.clear_dwell(pump_number);
                self.model.clear_preset(pump_number);
                if let Some(pump) = self.model.pump_mut(pump_number) {
                    pump.status = PumpState::Idle;
                    pump.nozzle = 0;
                    pump.user = None;
                }
                debug!(pump = pump_number, "Authorization cancelled");
                self.emit_pump(pump_number);
            }
            PumpState::EndOfTransaction => {
                // Finalize: the transaction id becomes the "last
                // transaction" signal and the pump is ready again.
                if let Some(pump) = self.model.pump_mut(pump_number) {
                    pump.last_transaction_id = Some(pump.transaction_id);
                    pump.transaction_id = 0;
                    pump.status = PumpState::Idle;
                    pump.nozzle = 0;
                    pump.user = None;
                }
                debug!(pump = pump_number, "Transaction finalized");
                self.emit_pump(pump_number);
            }
            PumpState::Idle => {
                // Nothing to do; deliberately no event.
            }
        }

        self.model
            .pump(pump_number)
            .cloned()
            .ok_or_else(|| CommandError::unknown_pump(pump_number))
    }

    /// `setTankLevel(tank, volume)` - operator override of a tank level.
    pub fn set_tank_level(&mut self, tank_number: u32, volume: f64) -> CommandResult<Tank> {
        if volume < 0.0 {
            return Err(CommandError::invalid_parameter(
                "tank volume must not be negative",
            ));
        }

        let Some(tank) = self.model.tank_mut(tank_number) else {
            return Err(CommandError::unknown_tank(tank_number));
        };
        tank.set_product_volume(volume);
        let updated = tank.clone();

        debug!(
            tank = tank_number,
            volume = updated.product_volume,
            filling = updated.filling_percentage,
            "Tank level set"
        );
        self.emit_tank(tank_number);
        Ok(updated)
    }

    // =========================================================================
    // Event Emission
    // =========================================================================

    fn emit_pump(&self, number: u32) {
        if let Some(pump) = self.model.pump(number) {
            self.distributor.publish(ForecourtEvent::PumpStatus {
                pump: number,
                status: pump.clone(),
            });
        }
    }

    fn emit_tank(&self, number: u32) {
        if let Some(tank) = self.model.tank(number) {
            self.distributor.publish(ForecourtEvent::TankStatus {
                tank: number,
                status: tank.clone(),
            });
        }
    }

    /// Read access to the model for in-process consumers and tests.
    pub fn model(&self) -> &ForecourtModel {
        &self.model
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast;

    /// Engine with a 1-tick dwell and 0.5 L/tick flow, plus an event tap.
    fn test_engine() -> (ForecourtEngine, broadcast::Receiver<ForecourtEvent>) {
        let mut config = ForecourtConfig::default();
        config.dwell_ticks = 1;
        let distributor = EventDistributor::new(1024);
        let rx = distributor.subscribe();
        (ForecourtEngine::new(config, distributor, None), rx)
    }

    fn start_filling(engine: &mut ForecourtEngine, pump: u32, preset: Option<Preset>, price: f64) {
        engine
            .authorize(pump, 1, preset, price, "attendant".into())
            .unwrap();
        engine.tick(); // dwell elapses, Filling starts
    }

    fn drain_events(rx: &mut broadcast::Receiver<ForecourtEvent>) -> Vec<ForecourtEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_authorize_resets_volume_and_records_details() {
        let (mut engine, _rx) = test_engine();
        let pump = engine
            .authorize(1, 2, None, 1.65, "attendant-7".into())
            .unwrap();

        assert_eq!(pump.status, PumpState::Authorized);
        assert_eq!(pump.nozzle, 2);
        assert_eq!(pump.price, 1.65);
        assert_eq!(pump.volume, 0.0);
        assert_eq!(pump.amount, 0.0);
        assert_eq!(pump.transaction_id, 0);
        assert_eq!(pump.user.as_deref(), Some("attendant-7"));
    }

    #[test]
    fn test_dwell_delays_filling() {
        let mut config = ForecourtConfig::default();
        config.dwell_ticks = 3;
        let (mut engine, _) = {
            let distributor = EventDistributor::new(64);
            let rx = distributor.subscribe();
            (ForecourtEngine::new(config, distributor, None), rx)
        };

        engine.authorize(1, 1, None, 1.65, "a".into()).unwrap();
        engine.tick();
        engine.tick();
        assert_eq!(engine.model().pump(1).unwrap().status, PumpState::Authorized);

        engine.tick(); // third tick: dwell threshold reached
        let pump = engine.model().pump(1).unwrap();
        assert_eq!(pump.status, PumpState::Filling);
        assert!(pump.transaction_id > 0);
    }

    #[test]
    fn test_amount_invariant_holds_every_tick() {
        let (mut engine, _rx) = test_engine();
        start_filling(&mut engine, 1, None, 1.65);

        let mut previous_volume = 0.0;
        for _ in 0..50 {
            engine.tick();
            let pump = engine.model().pump(1).unwrap();
            // Exact, not approximate: amount is always computed from volume.
            assert_eq!(pump.amount, pump.volume * pump.price);
            assert!(pump.volume >= previous_volume);
            previous_volume = pump.volume;
        }
    }

    #[test]
    fn test_scenario_a_preset_amount() {
        let (mut engine, _rx) = test_engine();
        let (record_tx, mut record_rx) = mpsc::channel(8);
        engine.recorder_tx = Some(record_tx);

        engine
            .authorize(1, 1, Some(Preset::Amount(50.0)), 1.65, "a".into())
            .unwrap();

        let mut ticks = 0;
        while engine.model().pump(1).unwrap().status != PumpState::EndOfTransaction {
            engine.tick();
            ticks += 1;
            assert!(ticks < 500, "preset never completed");
        }

        let pump = engine.model().pump(1).unwrap();
        assert!((pump.volume - 50.0 / 1.65).abs() < 1e-6);
        assert_eq!(pump.amount, pump.volume * pump.price);
        assert_eq!(forecourt_core::display_amount(pump.amount), 50.0);

        let record = record_rx.try_recv().unwrap();
        assert!(!record.synced);
        assert_eq!(record.display_amount(), 50.0);
        assert_eq!(record.transaction_id, pump.transaction_id);
    }

    #[test]
    fn test_preset_volume_stops_exactly() {
        let (mut engine, _rx) = test_engine();
        start_filling(&mut engine, 1, Some(Preset::Volume(2.0)), 1.50);

        for _ in 0..10 {
            engine.tick();
        }
        let pump = engine.model().pump(1).unwrap();
        assert_eq!(pump.status, PumpState::EndOfTransaction);
        assert_eq!(pump.volume, 2.0);
        assert_eq!(pump.amount, 2.0 * 1.50);
    }

    #[test]
    fn test_auto_stop_volume_ceiling() {
        let mut config = ForecourtConfig::default();
        config.dwell_ticks = 1;
        config.flow_rate = 10.0;
        config.auto_stop_volume = 25.0;
        let distributor = EventDistributor::new(64);
        let mut engine = ForecourtEngine::new(config, distributor, None);

        start_filling(&mut engine, 1, None, 1.0);
        for _ in 0..5 {
            engine.tick();
        }
        let pump = engine.model().pump(1).unwrap();
        assert_eq!(pump.status, PumpState::EndOfTransaction);
        assert!(pump.volume >= 25.0);
    }

    #[test]
    fn test_tank_loses_what_pump_dispenses() {
        let (mut engine, _rx) = test_engine();
        let before = engine.model().tank(1).unwrap().product_volume;

        start_filling(&mut engine, 1, None, 1.65);
        for _ in 0..10 {
            engine.tick();
        }

        let pump = engine.model().pump(1).unwrap();
        let tank = engine.model().tank(1).unwrap();
        assert!((before - tank.product_volume - pump.volume).abs() < 1e-9);
        assert_eq!(
            tank.filling_percentage,
            tank.product_volume / tank.capacity * 100.0
        );
    }

    #[test]
    fn test_stop_while_filling_completes_transaction() {
        let (mut engine, mut rx) = test_engine();
        start_filling(&mut engine, 1, None, 1.65);
        engine.tick();
        drain_events(&mut rx);

        let pump = engine.stop(1).unwrap();
        assert_eq!(pump.status, PumpState::EndOfTransaction);

        let events = drain_events(&mut rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, ForecourtEvent::Transaction { .. })));
    }

    #[test]
    fn test_stop_on_authorized_creates_no_transaction() {
        let (mut engine, _rx) = test_engine();
        engine.authorize(1, 1, None, 1.65, "a".into()).unwrap();

        let pump = engine.stop(1).unwrap();
        assert_eq!(pump.status, PumpState::Idle);
        assert_eq!(pump.transaction_id, 0);
        assert_eq!(pump.nozzle, 0);
        assert!(pump.user.is_none());
    }

    #[test]
    fn test_stop_is_idempotent_on_idle_pump() {
        let (mut engine, mut rx) = test_engine();
        drain_events(&mut rx);

        let first = engine.stop(1).unwrap();
        let second = engine.stop(1).unwrap();
        assert_eq!(first, second);
        assert_eq!(second.volume, 0.0);
        assert_eq!(second.amount, 0.0);
        // No state change means no event.
        assert!(drain_events(&mut rx).is_empty());
    }

    #[test]
    fn test_finalize_moves_transaction_to_last() {
        let (mut engine, _rx) = test_engine();
        start_filling(&mut engine, 1, None, 1.65);
        engine.tick();
        engine.stop(1).unwrap(); // Filling -> EndOfTransaction
        let completed_id = engine.model().pump(1).unwrap().transaction_id;

        let pump = engine.stop(1).unwrap(); // EndOfTransaction -> Idle
        assert_eq!(pump.status, PumpState::Idle);
        assert_eq!(pump.transaction_id, 0);
        assert_eq!(pump.last_transaction_id, Some(completed_id));
        // Volume resets only on the next authorization, not here.
        assert!(pump.volume > 0.0);

        let reauthorized = engine.authorize(1, 1, None, 1.65, "a".into()).unwrap();
        assert_eq!(reauthorized.volume, 0.0);
    }

    #[test]
    fn test_transaction_ids_increase_across_fuelings() {
        let (mut engine, _rx) = test_engine();

        start_filling(&mut engine, 1, None, 1.65);
        engine.tick();
        engine.stop(1).unwrap();
        let first = engine.model().pump(1).unwrap().transaction_id;
        engine.stop(1).unwrap();

        start_filling(&mut engine, 1, None, 1.65);
        engine.tick();
        engine.stop(1).unwrap();
        let second = engine.model().pump(1).unwrap().transaction_id;

        assert!(second > first);
    }

    #[test]
    fn test_unknown_targets_rejected_without_mutation() {
        let (mut engine, mut rx) = test_engine();
        drain_events(&mut rx);

        assert!(matches!(
            engine.authorize(99, 1, None, 1.65, "a".into()),
            Err(CommandError::InvalidTarget { .. })
        ));
        assert!(matches!(
            engine.stop(99),
            Err(CommandError::InvalidTarget { .. })
        ));
        assert!(matches!(
            engine.set_tank_level(99, 100.0),
            Err(CommandError::InvalidTarget { .. })
        ));
        assert!(drain_events(&mut rx).is_empty());
    }

    #[test]
    fn test_invalid_parameters_rejected_without_mutation() {
        let (mut engine, mut rx) = test_engine();
        drain_events(&mut rx);

        assert!(matches!(
            engine.authorize(1, 1, None, 0.0, "a".into()),
            Err(CommandError::InvalidParameter { .. })
        ));
        assert!(matches!(
            engine.authorize(1, 1, Some(Preset::Amount(-5.0)), 1.65, "a".into()),
            Err(CommandError::InvalidParameter { .. })
        ));
        assert!(matches!(
            engine.authorize(1, 0, None, 1.65, "a".into()),
            Err(CommandError::InvalidParameter { .. })
        ));

        assert_eq!(engine.model().pump(1).unwrap().status, PumpState::Idle);
        assert!(drain_events(&mut rx).is_empty());
    }

    #[test]
    fn test_scenario_b_set_tank_level() {
        let (mut engine, _rx) = test_engine();
        let tank = engine.set_tank_level(1, 5000.0).unwrap();
        assert_eq!(tank.product_volume, 5000.0);
        assert_eq!(tank.filling_percentage, 25.0);
    }

    #[test]
    fn test_push_event_matches_snapshot() {
        let (mut engine, mut rx) = test_engine();
        start_filling(&mut engine, 1, None, 1.65);
        engine.tick();

        let pushed = drain_events(&mut rx)
            .into_iter()
            .rev()
            .find_map(|event| match event {
                ForecourtEvent::PumpStatus { pump: 1, status } => Some(status),
                _ => None,
            })
            .unwrap();

        // A snapshot pulled immediately after the push reports identical
        // field values - no divergence between pull and push.
        let snapshot = engine.model().snapshot();
        assert_eq!(snapshot.pumps[&1], pushed);
    }

    #[test]
    fn test_dry_tank_ends_transaction() {
        let mut config = ForecourtConfig::default();
        config.dwell_ticks = 1;
        config.tanks[0].initial_volume = 1.0;
        let distributor = EventDistributor::new(64);
        let mut engine = ForecourtEngine::new(config, distributor, None);

        start_filling(&mut engine, 1, None, 1.65);
        for _ in 0..5 {
            engine.tick();
        }
        let pump = engine.model().pump(1).unwrap();
        assert_eq!(pump.status, PumpState::EndOfTransaction);
        assert!((pump.volume - 1.0).abs() < 1e-9);
        assert_eq!(engine.model().tank(1).unwrap().product_volume, 0.0);
    }

    #[tokio::test]
    async fn test_handle_round_trip() {
        let distributor = EventDistributor::new(64);
        let mut config = ForecourtConfig::default();
        // Long period: the actor's clock stays out of the way.
        config.tick_interval_ms = 60_000;
        let handle = ForecourtEngine::spawn(config, distributor, None);

        let pump = handle
            .authorize(1, 1, None, 1.65, "attendant".into())
            .await
            .unwrap();
        assert_eq!(pump.status, PumpState::Authorized);

        let statuses = handle.pump_statuses().await.unwrap();
        assert_eq!(statuses[&1].status, PumpState::Authorized);

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.pumps[&1], statuses[&1]);

        let err = handle.authorize(42, 1, None, 1.65, "x".into()).await;
        assert!(matches!(
            err,
            Err(EngineError::Command(CommandError::InvalidTarget { .. }))
        ));

        handle.shutdown().await.unwrap();
    }
}
