//! Async driver for the Quantum Composers MicroJewel laser.
//!
//! The MicroJewel speaks a line-oriented ASCII protocol over RS-232: the
//! driver frames each command as `;<addr>:<cmd>\r`, waits for the head's
//! documented turnaround time, and reads a single `\r`-terminated response
//! (`OK`, a query payload, or a `?`-coded error). [`Laser`] is the
//! high-level controller: connect, configure, arm and fire. Long burst
//! operations are kept alive by a background watchdog kicker, and
//! [`EmergencyStop`] handles let any task stop the laser mid-shot.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use microjewel::{Laser, Parity, PulseMode};
//!
//! #[tokio::main]
//! async fn main() -> microjewel::Result<()> {
//!     let mut laser = Laser::new();
//!     laser
//!         .connect("/dev/ttyUSB0", 115_200, Duration::from_secs(1), Parity::None)
//!         .await?;
//!
//!     laser.set_pulse_mode(PulseMode::Burst).await?;
//!     laser.set_rep_rate(5).await?;
//!     laser.set_burst_count(20).await?;
//!
//!     laser.arm().await?;
//!     laser.fire().await?;
//!     laser.disarm().await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod config;
pub mod error;
mod kicker;
pub mod laser;
pub mod mock;
pub mod protocol;
pub mod status;
pub mod transport;

pub use channel::CommandChannel;
pub use config::{DiodeTrigger, EnergyMode, LaserConfig, PulseMode, REP_RATE_RANGE};
pub use error::{LaserError, ProtocolError, Result};
pub use laser::{EmergencyStop, Laser, DEVICE_ADDRESS, NOMINAL_FIRING_CODES};
pub use mock::MockTransport;
pub use status::LaserStatus;
pub use transport::{Parity, SerialTransport, Transport};
