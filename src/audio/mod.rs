//! Audio energy pipeline.
//!
//! Data flow: the drum machine writes its mono mix to the [`MixBus`]
//! tap; the [`SpectralSampler`] turns buffered samples into a byte
//! spectrum on demand; [`average_energy`] reduces bin ranges to
//! normalized band energies; the [`EnergyPublisher`] packages the four
//! named bands into immutable [`EnergySnapshot`]s and fans them out;
//! the [`SamplingScheduler`] decides when all of that happens.

mod bus;
mod energy;
mod publisher;
mod sampler;
mod scheduler;

pub use bus::MixBus;
pub use energy::{average_energy, EnergySnapshot};
pub use publisher::{EnergyPublisher, SubscriberId};
pub use sampler::SpectralSampler;
pub use scheduler::{SamplingScheduler, SchedulerPolicy};
