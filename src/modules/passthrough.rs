//! Opaque service that only keeps its parameters.

use std::any::Any;

use crate::process::{InitContext, Service};
use crate::pset::ParameterSet;

/// Stand-in for services the framework does not implement (histogram
/// sinks, display drivers, ...). Other components can still read its
/// parameters through the service handle.
#[derive(Debug, Clone)]
pub struct PassThroughService {
    plugin: String,
    params: ParameterSet,
}

impl PassThroughService {
    pub fn new(ctx: &InitContext<'_>) -> Self {
        log::info!(
            "Service '{}' ({}) is pass-through with {} parameters",
            ctx.label(),
            ctx.plugin(),
            ctx.params().len()
        );
        PassThroughService {
            plugin: ctx.plugin().to_string(),
            params: ctx.params().clone(),
        }
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }
}

impl Service for PassThroughService {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{ServiceHandle, ServiceTable};
    use crate::pset::SearchPath;

    #[test]
    fn test_keeps_parameters() {
        let params = ParameterSet::builder()
            .set("fileName", "output_hist.root".to_string())
            .unwrap()
            .untracked("closeFileFast", false)
            .unwrap()
            .build();
        let services = ServiceTable::new();
        let search = SearchPath::new();
        let ctx = InitContext::new("TFileService", "TFileService", &params, &services, &search);

        let handle = ServiceHandle::new("TFileService", Box::new(PassThroughService::new(&ctx)));
        let name = handle
            .with(|s: &PassThroughService| s.params().get::<String>("fileName").unwrap())
            .unwrap();
        assert_eq!(name, "output_hist.root");
        assert_eq!(
            handle.with(|s: &PassThroughService| s.plugin().to_string()),
            Some("TFileService".to_string())
        );
    }
}
