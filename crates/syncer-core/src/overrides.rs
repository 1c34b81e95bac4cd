//! Registry overrides
//!
//! Flips the registration status of instances of one service, matching them
//! by a metadata value or by ip against a regular expression. Only instances
//! whose status actually has to be set are pushed back to the registry.

use regex::Regex;
use tracing::info;

use syncer_common::{
    DiscoveryClient, Instance, MatchType, Registration, Result, SyncerError,
};

/// Mark instances according to `registration` and return the ones to push
///
/// Matching instances get `status`, the others `other_status`. An `ORIGIN`
/// status leaves the instance untouched. A missing metadata key is a
/// non-match.
pub fn mark_instances(registration: &Registration, instances: &[Instance]) -> Result<Vec<Instance>> {
    let pattern = Regex::new(&registration.regexp_str)
        .map_err(|e| SyncerError::invalid_pattern(&registration.regexp_str, e))?;

    let marked = instances
        .iter()
        .filter_map(|instance| {
            let subject = match registration.match_type {
                MatchType::Ip => Some(instance.ip.as_str()),
                MatchType::Metadata => instance
                    .metadata
                    .get(&registration.metadata_key)
                    .map(String::as_str),
            };
            let is_match = subject.is_some_and(|s| pattern.is_match(s));
            let status = if is_match {
                registration.status
            } else {
                registration.other_status
            };

            status.enabled().map(|enabled| {
                let mut marked = instance.reset();
                marked.enabled = enabled;
                marked.changed = true;
                marked
            })
        })
        .collect();
    Ok(marked)
}

/// Fetch, mark and push overrides for `registration.service_name`
pub async fn apply_registration(
    client: &dyn DiscoveryClient,
    registration: &Registration,
) -> Result<usize> {
    let instances = client
        .list_instances(&registration.service_name, &registration.ext_data)
        .await?;
    let marked = mark_instances(registration, &instances)?;
    if marked.is_empty() {
        return Ok(0);
    }

    info!(
        service = %registration.service_name,
        kind = client.kind(),
        count = marked.len(),
        "applying registration overrides"
    );
    client
        .apply_overrides(&registration.service_name, &marked)
        .await?;
    Ok(marked.len())
}
