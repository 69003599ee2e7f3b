//! Registry of the export resources this connector can read.

use crate::resources::{Events, Profiles, Resource};
use std::sync::Arc;

/// Returns every available resource, in catalog order.
pub fn get_all_resources() -> Vec<Arc<dyn Resource>> {
    vec![Arc::new(Profiles), Arc::new(Events)]
}

/// Looks up a resource by stream name.
pub fn find_resource(name: &str) -> Option<Arc<dyn Resource>> {
    get_all_resources().into_iter().find(|r| r.name() == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_all_resources() {
        let resources = get_all_resources();
        let names: Vec<_> = resources.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["profiles", "events"]);
    }

    #[test]
    fn test_find_resource() {
        assert_eq!(find_resource("events").unwrap().name(), "events");
        assert!(find_resource("campaigns").is_none());
    }
}
