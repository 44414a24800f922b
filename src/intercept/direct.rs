//! Direct in-page interceptor strategy.

// self
use crate::{
	_prelude::*,
	auth::ResourceServerId,
	channel::MessagePort,
	intercept::{DirectInterceptorFactory, InstalledInterception},
};

/// Builds the direct interceptor; it is usable as soon as it exists, so nothing is awaited.
pub(crate) fn install(
	factory: &dyn DirectInterceptorFactory,
	resource_servers: Vec<ResourceServerId>,
	events: MessagePort,
	interceptor_port: MessagePort,
) -> Result<InstalledInterception> {
	let proxy = factory.create(resource_servers, interceptor_port)?;

	Ok(InstalledInterception { proxy, events, first_event: None })
}
