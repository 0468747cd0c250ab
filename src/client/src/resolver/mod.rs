mod documents;
#[allow(clippy::module_inception)]
mod resolver;
mod single_flight;

pub use resolver::{PageFetcher, ResolverSettings, StreamUrlResolver};
pub use single_flight::SingleFlight;
