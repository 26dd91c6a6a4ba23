//! Device controller for the MicroJewel laser head.
//!
//! `Laser` owns the session state machine: Disconnected until `connect`
//! succeeds, then Connected with the armed/firing state always re-queried
//! from the device — no locally cached arm flag is ever trusted for a
//! safety decision. Firing is a transient state entered only for the
//! duration of [`Laser::fire`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::sync::{watch, Notify};

use crate::channel::CommandChannel;
use crate::config::{DiodeTrigger, EnergyMode, LaserConfig, PulseMode, REP_RATE_RANGE};
use crate::error::{LaserError, ProtocolError, Result};
use crate::kicker::Kicker;
use crate::protocol;
use crate::status::LaserStatus;
use crate::transport::{Parity, SerialTransport, Transport};

/// Default device address on the serial link.
pub const DEVICE_ADDRESS: &str = "LA";

/// Status words observed on a nominally firing head: 3075 in manual energy
/// mode, 11267 with high power mode selected.
///
/// These values are empirically derived from the control manual's examples
/// rather than guaranteed by the protocol; revalidate them against real
/// hardware before trusting a new head or firmware revision.
pub const NOMINAL_FIRING_CODES: [u32; 2] = [3075, 11267];

/// Burst waits at or above this threshold outlast the head's internal
/// watchdog and need kicking.
const WATCHDOG_THRESHOLD: Duration = Duration::from_secs(2);

/// Controller for a single MicroJewel laser head.
pub struct Laser {
    channel: Arc<CommandChannel>,
    config: LaserConfig,
    kick_tx: watch::Sender<bool>,
    kicker: Option<Kicker>,
    abort: Arc<Notify>,
    waiting: Arc<AtomicBool>,
}

impl Laser {
    /// Create a disconnected controller with the default device address
    /// and the documented default configuration.
    pub fn new() -> Self {
        Self::with_address(DEVICE_ADDRESS)
    }

    /// Create a disconnected controller for a device at `address`.
    pub fn with_address(address: &str) -> Self {
        let (kick_tx, _) = watch::channel(false);
        Self {
            channel: Arc::new(CommandChannel::new(address)),
            config: LaserConfig::default(),
            kick_tx,
            kicker: None,
            abort: Arc::new(Notify::new()),
            waiting: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Open `port` and bind it to this controller.
    ///
    /// The port must be among the system's enumerated serial ports; baud,
    /// timeout and parity are validated before the port is touched. The
    /// very first successful connect spawns the watchdog kicker; later
    /// connects reuse it.
    pub async fn connect(
        &mut self,
        port: &str,
        baud_rate: u32,
        timeout: Duration,
        parity: Parity,
    ) -> Result<()> {
        let transport = SerialTransport::open(port, baud_rate, timeout, parity)?;
        info!("connected to laser on '{port}' at {baud_rate} baud");
        self.install(Box::new(transport), timeout).await
    }

    /// Bind an already-open transport (a mock, or an alternate serial
    /// backend) to this controller. Same kicker semantics as [`connect`].
    ///
    /// [`connect`]: Laser::connect
    pub async fn connect_transport(
        &mut self,
        transport: Box<dyn Transport>,
        read_timeout: Duration,
    ) -> Result<()> {
        self.install(transport, read_timeout).await
    }

    async fn install(
        &mut self,
        transport: Box<dyn Transport>,
        read_timeout: Duration,
    ) -> Result<()> {
        self.channel.attach(transport, read_timeout).await;
        if self.kicker.is_none() {
            self.kicker = Some(Kicker::spawn(
                Arc::clone(&self.channel),
                self.kick_tx.subscribe(),
            ));
        }
        Ok(())
    }

    /// Release the transport. The kicker keeps running (idle) so a later
    /// reconnect does not spawn a second one.
    pub async fn disconnect(&mut self) {
        self.channel.detach().await;
        info!("disconnected from laser");
    }

    /// Whether a transport is currently bound.
    pub async fn is_connected(&self) -> bool {
        self.channel.is_attached().await
    }

    /// The session-local copy of the device configuration.
    pub fn config(&self) -> &LaserConfig {
        &self.config
    }

    // ---- command plumbing ------------------------------------------------

    async fn transact(&self, command: &str) -> Result<Vec<u8>> {
        match self.channel.send(command).await? {
            Some(response) => Ok(response),
            None => Err(LaserError::Timeout),
        }
    }

    /// Send a command that must be acknowledged with the `OK` literal.
    async fn command(&self, command: &str) -> Result<()> {
        send_expect_ack(&self.channel, command).await
    }

    /// Send a query and return its payload, mapping `?` error frames.
    async fn query(&self, command: &str) -> Result<String> {
        let response = self.transact(command).await?;
        Ok(protocol::expect_payload(&response)?.to_string())
    }

    // ---- arm / fire ------------------------------------------------------

    /// Arm the laser (`EN 1`).
    pub async fn arm(&self) -> Result<()> {
        self.command("EN 1").await
    }

    /// Disarm the laser (`EN 0`).
    pub async fn disarm(&self) -> Result<()> {
        self.command("EN 0").await
    }

    /// Query whether the laser is armed (`EN?`). True iff the first
    /// payload byte is `1`.
    pub async fn check_armed(&self) -> Result<bool> {
        let payload = self.query("EN?").await?;
        Ok(payload.as_bytes().first() == Some(&b'1'))
    }

    /// Query and decode the status word (`SS?`).
    pub async fn status(&self) -> Result<LaserStatus> {
        let payload = self.query("SS?").await?;
        LaserStatus::parse(&payload)
    }

    /// Execute the full fire sequence.
    ///
    /// 1. `FL 1`, which must be acknowledged.
    /// 2. Policy gate: firing in low energy mode is disallowed.
    /// 3. Policy gate: the device must report itself armed.
    /// 4. Verification: the status word must match a known nominal firing
    ///    code, else the shot is aborted (`FL 0`) and the call fails with
    ///    [`LaserError::FailedToFire`].
    /// 5. Wait out the shot: the pulse period (continuous), one rep-rate
    ///    period (single shot) or the burst duration (burst). Burst waits
    ///    of two seconds or more raise the watchdog kicker flag for the
    ///    duration. An emergency stop interrupts the wait promptly, in
    ///    which case the call fails with [`LaserError::Aborted`] and the
    ///    stop path owns the `FL 0`.
    /// 6. `FL 0` on normal completion.
    pub async fn fire(&self) -> Result<()> {
        self.command("FL 1").await?;

        if self.config.energy_mode == EnergyMode::Low {
            return Err(LaserError::Policy("firing is not allowed in low energy mode"));
        }
        if !self.check_armed().await? {
            return Err(LaserError::Policy("laser is not armed"));
        }

        let word = self.status().await?.to_word();
        if !NOMINAL_FIRING_CODES.contains(&word) {
            // Safety abort, not a retry: stop the shot before reporting.
            if let Err(e) = self.command("FL 0").await {
                warn!("abort after failed fire verification also failed: {e}");
            }
            return Err(LaserError::FailedToFire { status: word });
        }

        let wait = match self.config.pulse_mode {
            PulseMode::Continuous => Duration::from_secs_f64(self.config.pulse_period_s),
            PulseMode::SingleShot => {
                Duration::from_secs_f64(1.0 / f64::from(self.config.rep_rate_hz))
            }
            PulseMode::Burst => self.config.burst_duration(),
        };

        let kick = self.config.pulse_mode == PulseMode::Burst && wait >= WATCHDOG_THRESHOLD;
        if kick {
            info!("burst of {:?} >= 2s, enabling watchdog kicks", wait);
            let _ = self.kick_tx.send(true);
        }

        self.waiting.store(true, Ordering::SeqCst);
        let aborted = tokio::select! {
            _ = tokio::time::sleep(wait) => false,
            _ = self.abort.notified() => true,
        };
        self.waiting.store(false, Ordering::SeqCst);

        if kick {
            let _ = self.kick_tx.send(false);
        }

        if aborted {
            // The emergency stop path has already issued FL 0.
            return Err(LaserError::Aborted);
        }

        self.command("FL 0").await
    }

    /// Immediately stop firing (`FL 0`), interrupting an in-progress
    /// firing wait first. See [`EmergencyStop`] for stopping from another
    /// task.
    pub async fn emergency_stop(&self) -> Result<()> {
        self.stop_handle().stop().await
    }

    /// A cloneable handle that can stop the laser from another task while
    /// [`Laser::fire`] is in progress.
    pub fn stop_handle(&self) -> EmergencyStop {
        EmergencyStop {
            channel: Arc::clone(&self.channel),
            abort: Arc::clone(&self.abort),
            waiting: Arc::clone(&self.waiting),
        }
    }

    // ---- parameter setters -----------------------------------------------
    //
    // Each setter validates locally, sends the matching command, and
    // commits to the session config only on an `OK` acknowledgement; any
    // other response leaves the config unchanged.

    /// Set the shot mode (`PM`).
    pub async fn set_pulse_mode(&mut self, mode: PulseMode) -> Result<()> {
        self.command(&format!("PM {}", mode.code())).await?;
        self.config.pulse_mode = mode;
        Ok(())
    }

    /// Set the continuous-mode pulse period in seconds (`PE`).
    pub async fn set_pulse_period(&mut self, seconds: f64) -> Result<()> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(LaserError::Validation(format!(
                "pulse period must be a non-negative number of seconds, got {seconds}"
            )));
        }
        self.command(&format!("PE {seconds}")).await?;
        self.config.pulse_period_s = seconds;
        Ok(())
    }

    /// Set the diode trigger source (`DT`).
    pub async fn set_diode_trigger(&mut self, trigger: DiodeTrigger) -> Result<()> {
        self.command(&format!("DT {}", trigger.code())).await?;
        self.config.diode_trigger = trigger;
        Ok(())
    }

    /// Set the diode pulse width in seconds (`DW`).
    pub async fn set_pulse_width(&mut self, seconds: f64) -> Result<()> {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(LaserError::Validation(format!(
                "pulse width must be a positive number of seconds, got {seconds}"
            )));
        }
        self.command(&format!("DW {seconds}")).await?;
        self.config.pulse_width_s = seconds;
        Ok(())
    }

    /// Set the number of shots per burst (`BC`).
    pub async fn set_burst_count(&mut self, count: u32) -> Result<()> {
        if count == 0 {
            return Err(LaserError::Validation(
                "burst count must be a positive integer".to_string(),
            ));
        }
        self.command(&format!("BC {count}")).await?;
        self.config.burst_count = count;
        Ok(())
    }

    /// Set the repetition rate in Hz (`RR`). Allowed range is 1-5.
    pub async fn set_rep_rate(&mut self, hz: u32) -> Result<()> {
        if !REP_RATE_RANGE.contains(&hz) {
            return Err(LaserError::Validation(format!(
                "repetition rate must be between {} and {} Hz, got {hz}",
                REP_RATE_RANGE.start(),
                REP_RATE_RANGE.end()
            )));
        }
        self.command(&format!("RR {hz}")).await?;
        self.config.rep_rate_hz = hz;
        Ok(())
    }

    /// Set the diode current in amps (`DC`). Adjusting the current
    /// directly always forces the energy mode back to manual.
    pub async fn set_diode_current(&mut self, amps: f64) -> Result<()> {
        if !amps.is_finite() || amps <= 0.0 {
            return Err(LaserError::Validation(format!(
                "diode current must be a positive number of amps, got {amps}"
            )));
        }
        self.command(&format!("DC {amps}")).await?;
        self.config.diode_current_a = amps;
        self.config.energy_mode = EnergyMode::Manual;
        Ok(())
    }

    /// Set the energy mode (`EM`).
    pub async fn set_energy_mode(&mut self, mode: EnergyMode) -> Result<()> {
        self.command(&format!("EM {}", mode.code())).await?;
        self.config.energy_mode = mode;
        Ok(())
    }

    // ---- telemetry -------------------------------------------------------
    //
    // The vendor does not document the numeric formatting of most of these
    // payloads, so they are returned as raw text unless the manual pins
    // down the type.

    /// FET temperature (`FT?`), raw payload text.
    pub async fn fet_temp(&self) -> Result<String> {
        self.query("FT?").await
    }

    /// Resonator temperature (`TR?`), raw payload text.
    pub async fn resonator_temp(&self) -> Result<String> {
        self.query("TR?").await
    }

    /// FET voltage (`FV?`), raw payload text.
    pub async fn fet_voltage(&self) -> Result<String> {
        self.query("FV?").await
    }

    /// Measured diode current (`IM?`), raw payload text.
    pub async fn diode_current(&self) -> Result<String> {
        self.query("IM?").await
    }

    /// Bank voltage (`BV?`) as a float.
    pub async fn bank_voltage(&self) -> Result<f64> {
        let payload = self.query("BV?").await?;
        payload
            .trim()
            .parse()
            .map_err(|_| LaserError::Malformed(payload))
    }

    /// Laser identity string (`ID?`).
    pub async fn laser_id(&self) -> Result<String> {
        self.query("ID?").await
    }

    /// Latched status (`LS?`), raw payload text.
    pub async fn latched_status(&self) -> Result<String> {
        self.query("LS?").await
    }

    /// System shot count since factory build (`SC?`).
    pub async fn shot_count(&self) -> Result<u64> {
        let payload = self.query("SC?").await?;
        payload
            .trim()
            .parse()
            .map_err(|_| LaserError::Malformed(payload))
    }

    // ---- bulk operations -------------------------------------------------

    /// Reset the device (`RS`) and, on acknowledgement, restore the
    /// documented default configuration and push it back out.
    pub async fn reset(&mut self) -> Result<()> {
        self.command("RS").await?;
        self.config = LaserConfig::default();
        self.push_settings().await
    }

    /// Push the full session configuration to the device as individual
    /// commands, in the fixed order RR, BC, DC, EM, PM, DW, DT.
    ///
    /// The push is not atomic: the first rejected setting aborts it and is
    /// returned to the caller, but settings the device already accepted
    /// stay applied. The protocol offers no read-back snapshot that would
    /// allow a rollback.
    pub async fn push_settings(&self) -> Result<()> {
        let c = &self.config;
        let commands = [
            format!("RR {}", c.rep_rate_hz),
            format!("BC {}", c.burst_count),
            format!("DC {}", c.diode_current_a),
            format!("EM {}", c.energy_mode.code()),
            format!("PM {}", c.pulse_mode.code()),
            format!("DW {}", c.pulse_width_s),
            format!("DT {}", c.diode_trigger.code()),
        ];
        for command in &commands {
            self.command(command).await?;
        }
        Ok(())
    }
}

impl Default for Laser {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Laser {
    fn drop(&mut self) {
        if let Some(mut kicker) = self.kicker.take() {
            kicker.stop();
        }
    }
}

/// Dedicated abort path for stopping the laser from outside the task that
/// called [`Laser::fire`].
///
/// `stop` first wakes an in-progress firing wait (so the stop does not
/// queue behind it) and then issues `FL 0` itself; the interrupted `fire`
/// returns [`LaserError::Aborted`] without writing a second stop command.
#[derive(Clone)]
pub struct EmergencyStop {
    channel: Arc<CommandChannel>,
    abort: Arc<Notify>,
    waiting: Arc<AtomicBool>,
}

impl EmergencyStop {
    /// Stop the laser immediately (`FL 0`).
    pub async fn stop(&self) -> Result<()> {
        if self.waiting.load(Ordering::SeqCst) {
            self.abort.notify_one();
        }
        send_expect_ack(&self.channel, "FL 0").await?;
        info!("emergency stop acknowledged");
        Ok(())
    }
}

async fn send_expect_ack(channel: &CommandChannel, command: &str) -> Result<()> {
    let response = match channel.send(command).await? {
        Some(response) => response,
        None => return Err(LaserError::Timeout),
    };
    if response == protocol::ACK {
        return Ok(());
    }
    Err(ProtocolError::from_response(protocol::payload(&response)?).into())
}
