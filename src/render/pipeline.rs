//! # Render-On-Miss Pipeline
//!
//! Composes the item store and a renderer: a lookup that misses is rendered,
//! stored under a freshly minted token and served. Properties that render
//! together (html and data-parsoid) come out of one render and share its
//! token, and concurrent misses anywhere in such a group share that render.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;

use super::errors::{PipelineError, PipelineResult, RenderError, RenderResult};
use super::renderer::{PropertyRequest, RenderRequest, Renderer};
use crate::identity::Selector;
use crate::items::{ItemKey, ItemStore, Lookup, RenderedContent, Snapshot};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};
use crate::registry::{BucketRecord, PropertySpec};
use crate::storage::StorageError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FlightKey {
    /// The item of the render group's leading property
    item: ItemKey,
    revision: u64,
    /// Forced renders never share a flight with plain misses
    fresh: bool,
}

/// Snapshots produced (or found) by one flight, by property name
type Bundle = BTreeMap<String, Snapshot>;

type Flight = Arc<OnceCell<PipelineResult<Bundle>>>;

pub struct RenderPipeline {
    items: Arc<ItemStore>,
    renderer: Arc<dyn Renderer>,
    metrics: Arc<MetricsRegistry>,
    flights: Mutex<HashMap<FlightKey, Flight>>,
}

impl RenderPipeline {
    pub fn new(
        items: Arc<ItemStore>,
        renderer: Arc<dyn Renderer>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            items,
            renderer,
            metrics,
            flights: Mutex::new(HashMap::new()),
        }
    }

    pub fn items(&self) -> &Arc<ItemStore> {
        &self.items
    }

    pub fn renderer_name(&self) -> &'static str {
        self.renderer.name()
    }

    /// Resolve `selector` for `item`, rendering on a miss.
    ///
    /// Misses in buckets that do not render are reported as not found.
    pub async fn get(
        &self,
        bucket: &BucketRecord,
        item: &ItemKey,
        selector: &Selector,
        no_cache: bool,
    ) -> PipelineResult<Snapshot> {
        let revision = match self.items.get(item, selector, no_cache)? {
            Lookup::Hit(snapshot) => {
                self.metrics.increment_cache_hits();
                return Ok(snapshot);
            }
            Lookup::Miss(revision) => revision,
        };
        self.metrics.increment_cache_misses();

        let capabilities = bucket.kind.capabilities();
        let property = match item.property.as_deref() {
            Some(property) if capabilities.renders => property,
            _ => return Err(PipelineError::NotFound(format!("{} at {}", item, revision))),
        };
        let group = capabilities.render_group(property);
        if group.is_empty() {
            return Err(PipelineError::NotFound(format!("{} at {}", item, revision)));
        }

        let mut bundle = self.render_shared(item, revision, no_cache, &group).await?;
        bundle.remove(property).ok_or_else(|| {
            RenderError::Upstream(format!("no {} rendered for {}", property, item)).into()
        })
    }

    async fn render_shared(
        &self,
        item: &ItemKey,
        revision: u64,
        fresh: bool,
        group: &[&'static PropertySpec],
    ) -> PipelineResult<Bundle> {
        let key = FlightKey {
            item: with_property(item, group[0].name),
            revision,
            fresh,
        };

        let (flight, joined) = {
            let mut flights = self
                .flights
                .lock()
                .map_err(|_| StorageError::lock_poisoned())?;
            match flights.get(&key) {
                // A forced request only joins a render that is still running
                Some(flight) if !(fresh && flight.initialized()) => (Arc::clone(flight), true),
                _ => {
                    let flight: Flight = Arc::new(OnceCell::new());
                    flights.insert(key.clone(), Arc::clone(&flight));
                    (flight, false)
                }
            }
        };

        if joined {
            self.metrics.increment_renders_deduplicated();
            let item_name = item.to_string();
            let revision = revision.to_string();
            log_event_with_fields(
                Event::RenderJoined,
                &[("item", item_name.as_str()), ("revision", revision.as_str())],
            );
        }

        let result = flight
            .get_or_init(|| self.render_and_store(&key.item, revision, fresh, group))
            .await
            .clone();

        // Whoever finishes first retires the flight; a later miss starts anew.
        if let Ok(mut flights) = self.flights.lock() {
            if flights
                .get(&key)
                .map(|current| Arc::ptr_eq(current, &flight))
                .unwrap_or(false)
            {
                flights.remove(&key);
            }
        }

        result
    }

    async fn render_and_store(
        &self,
        lead: &ItemKey,
        revision: u64,
        fresh: bool,
        group: &[&'static PropertySpec],
    ) -> PipelineResult<Bundle> {
        let mut bundle = Bundle::new();
        let mut wanted = Vec::with_capacity(group.len());
        for spec in group {
            let item = with_property(lead, spec.name);
            // A flight that finished just before this one started may have
            // stored the revision already.
            if !fresh {
                if let Lookup::Hit(snapshot) =
                    self.items.get(&item, &Selector::Revision(revision), false)?
                {
                    bundle.insert(spec.name.to_string(), snapshot);
                    continue;
                }
            }
            wanted.push((item, *spec));
        }
        if wanted.is_empty() {
            return Ok(bundle);
        }

        let item_name = lead.to_string();
        let revision_str = revision.to_string();
        let properties = wanted
            .iter()
            .map(|(_, spec)| spec.name)
            .collect::<Vec<_>>()
            .join(",");
        log_event_with_fields(
            Event::RenderBegin,
            &[
                ("item", item_name.as_str()),
                ("properties", properties.as_str()),
                ("renderer", self.renderer.name()),
                ("revision", revision_str.as_str()),
            ],
        );
        self.metrics.increment_renders();

        let parts = match self.render_parts(lead, revision, wanted).await {
            Ok(parts) => parts,
            Err(err) => {
                self.metrics.increment_render_failures();
                let error = err.to_string();
                log_event_with_fields(
                    Event::RenderFailed,
                    &[
                        ("error", error.as_str()),
                        ("item", item_name.as_str()),
                        ("revision", revision_str.as_str()),
                    ],
                );
                return Err(err.into());
            }
        };

        let names: Vec<String> = parts
            .iter()
            .filter_map(|part| part.item.property.clone())
            .collect();
        let items = Arc::clone(&self.items);
        let snapshots = tokio::task::spawn_blocking(move || items.put_rendered(revision, parts))
            .await
            .map_err(|e| {
                StorageError::write_failed(
                    format!("Snapshot write for {} did not complete", item_name),
                    io::Error::new(io::ErrorKind::Other, e.to_string()),
                )
            })??;

        let token = snapshots
            .first()
            .map(|snapshot| snapshot.token.to_string())
            .unwrap_or_default();
        for (name, snapshot) in names.into_iter().zip(snapshots) {
            self.metrics.increment_snapshots_written();
            bundle.insert(name, snapshot);
        }

        log_event_with_fields(
            Event::RenderComplete,
            &[
                ("item", item_name.as_str()),
                ("properties", properties.as_str()),
                ("revision", revision_str.as_str()),
                ("token", token.as_str()),
            ],
        );
        Ok(bundle)
    }

    /// One renderer call for every wanted property; a part missing from the
    /// answer fails the whole render.
    async fn render_parts(
        &self,
        lead: &ItemKey,
        revision: u64,
        wanted: Vec<(ItemKey, &'static PropertySpec)>,
    ) -> RenderResult<Vec<RenderedContent>> {
        let request = RenderRequest {
            domain: lead.domain.clone(),
            title: lead.title.clone(),
            revision,
            properties: wanted
                .iter()
                .map(|(_, spec)| PropertyRequest {
                    name: spec.name.to_string(),
                    default_content_type: spec.default_content_type.to_string(),
                })
                .collect(),
        };
        let mut rendered = self.renderer.render(&request).await?;

        wanted
            .into_iter()
            .map(|(item, spec)| {
                let index = rendered
                    .parts
                    .iter()
                    .position(|part| part.property == spec.name)
                    .ok_or_else(|| {
                        RenderError::Upstream(format!("renderer returned no {} for {}", spec.name, lead))
                    })?;
                let part = rendered.parts.swap_remove(index);
                Ok(RenderedContent {
                    item,
                    content_type: part.content_type,
                    body: part.body,
                })
            })
            .collect()
    }
}

fn with_property(item: &ItemKey, property: &str) -> ItemKey {
    ItemKey::new(&item.domain, &item.bucket, &item.title, Some(property))
}
