use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::{collections::HashMap, collections::HashSet, fmt, sync::Arc};
use tokio::sync::watch;

use crate::{
    error::{AddCityError, FetchError},
    model::{City, CityId, WeatherSnapshot},
    provider::WeatherClient,
    store::KeyValueStore,
};

/// Key of the persisted collection in the durable store.
pub const CITIES_KEY: &str = "weather-cities";

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

type FetchOutcome = Result<WeatherSnapshot, FetchError>;

#[derive(Debug, Default)]
struct State {
    cities: Vec<City>,
    tickets: HashMap<CityId, u64>,
    next_ticket: u64,
}

impl State {
    fn contains(&self, id: &CityId) -> bool {
        self.cities.iter().any(|c| &c.id == id)
    }

    /// Mark `id` as loading and hand out a fresh ticket for its fetch.
    fn begin_fetch(&mut self, id: &CityId) -> Option<(u64, String)> {
        let city = self.cities.iter_mut().find(|c| &c.id == id)?;
        city.is_loading = true;
        self.next_ticket += 1;
        self.tickets.insert(id.clone(), self.next_ticket);
        Some((self.next_ticket, city.display_name.clone()))
    }

    /// Apply a settled fetch. Returns `false` when the result was dropped.
    fn merge(
        &mut self,
        id: &CityId,
        ticket: u64,
        outcome: FetchOutcome,
        now: DateTime<Utc>,
    ) -> bool {
        if self.tickets.get(id) != Some(&ticket) {
            return false;
        }
        self.tickets.remove(id);

        match self.cities.iter_mut().find(|c| &c.id == id) {
            Some(city) => {
                apply_outcome(city, outcome, now);
                true
            }
            None => false,
        }
    }

    fn remove(&mut self, id: &CityId) -> bool {
        self.tickets.remove(id);
        let before = self.cities.len();
        self.cities.retain(|c| &c.id != id);
        self.cities.len() != before
    }
}

/// Merge rule shared by add and both refresh paths.
fn apply_outcome(city: &mut City, outcome: FetchOutcome, now: DateTime<Utc>) {
    match outcome {
        Ok(snapshot) => {
            city.snapshot = Some(snapshot);
            city.error = None;
        }
        Err(err) => {
            city.error = Some(err.to_string());
        }
    }
    city.last_updated = Some(match city.last_updated {
        Some(prev) if prev > now => prev,
        _ => now,
    });
    city.is_loading = false;
}

/// Owns the tracked cities, runs add/remove/refresh against the weather client
/// and rewrites the persisted collection after each committed change.
///
/// State lives behind a mutex that is never held across an `.await`. Every fetch
/// gets a ticket; a result is merged only if its city still exists and the ticket
/// is still the newest for that id.
pub struct CityManager {
    client: Arc<dyn WeatherClient>,
    store: Arc<dyn KeyValueStore>,
    clock: Clock,
    state: Mutex<State>,
    updates: watch::Sender<Vec<City>>,
}

impl fmt::Debug for CityManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CityManager")
            .field("client", &self.client)
            .field("cities", &self.state.lock().cities.len())
            .finish()
    }
}

impl CityManager {
    /// Load the persisted collection. A missing, unreadable or corrupt record
    /// yields an empty collection; startup never fails on persistence.
    pub fn load(client: Arc<dyn WeatherClient>, store: Arc<dyn KeyValueStore>) -> Self {
        let cities = load_cities(store.as_ref());
        tracing::debug!(count = cities.len(), "Loaded city collection");

        let (updates, _) = watch::channel(cities.clone());
        Self {
            client,
            store,
            clock: Arc::new(Utc::now),
            state: Mutex::new(State {
                cities,
                ..State::default()
            }),
            updates,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn cities(&self) -> Vec<City> {
        self.state.lock().cities.clone()
    }

    pub fn get(&self, id: &CityId) -> Option<City> {
        self.state.lock().cities.iter().find(|c| &c.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Receiver that observes every state change, loading marks included.
    pub fn subscribe(&self) -> watch::Receiver<Vec<City>> {
        self.updates.subscribe()
    }

    /// Fetch first, insert on success only. On any failure the collection is
    /// left exactly as it was.
    pub async fn add(&self, name: &str) -> Result<Vec<City>, AddCityError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AddCityError::EmptyName);
        }

        let id = CityId::from_name(name);
        if self.state.lock().contains(&id) {
            tracing::info!(city = %id, "Rejected duplicate city");
            return Err(AddCityError::Duplicate { name: name.to_string() });
        }

        let snapshot = self.client.fetch_current(name).await.map_err(|source| {
            tracing::warn!(city = name, error = %source, "Add rolled back");
            AddCityError::Fetch {
                name: name.to_string(),
                source,
            }
        })?;

        let mut state = self.state.lock();
        // Another add of the same city may have committed while we were fetching.
        if state.contains(&id) {
            return Err(AddCityError::Duplicate { name: name.to_string() });
        }

        let mut city = City::pending(name);
        apply_outcome(&mut city, Ok(snapshot), (self.clock)());
        state.cities.push(city);
        tracing::info!(city = %id, "Added city");

        Ok(self.commit(&state))
    }

    /// Remove a city. Absent ids are a no-op, not an error.
    pub fn remove(&self, id: &CityId) -> Vec<City> {
        let mut state = self.state.lock();
        if state.remove(id) {
            tracing::info!(city = %id, "Removed city");
            self.commit(&state)
        } else {
            state.cities.clone()
        }
    }

    pub async fn refresh_one(&self, id: &CityId) -> Vec<City> {
        let (ticket, name) = {
            let mut state = self.state.lock();
            match state.begin_fetch(id) {
                Some(job) => {
                    self.publish(&state);
                    job
                }
                None => return state.cities.clone(),
            }
        };

        let outcome = self.client.fetch_current(&name).await;

        let mut state = self.state.lock();
        if state.merge(id, ticket, outcome, (self.clock)()) {
            tracing::debug!(city = %id, "Merged refresh");
            self.commit(&state)
        } else {
            tracing::debug!(city = %id, "Dropped stale refresh result");
            state.cities.clone()
        }
    }

    /// Refresh every city concurrently. Waits for all fetches to settle, never
    /// stopping at the first failure, then persists once.
    pub async fn refresh_all(&self) -> Vec<City> {
        let jobs: Vec<(CityId, u64, String)> = {
            let mut state = self.state.lock();
            let ids: Vec<CityId> = state.cities.iter().map(|c| c.id.clone()).collect();
            let jobs = ids
                .into_iter()
                .filter_map(|id| state.begin_fetch(&id).map(|(ticket, name)| (id, ticket, name)))
                .collect::<Vec<_>>();
            if jobs.is_empty() {
                return state.cities.clone();
            }
            self.publish(&state);
            jobs
        };

        tracing::debug!(count = jobs.len(), "Refreshing all cities");

        let handles: Vec<_> = jobs
            .into_iter()
            .map(|(id, ticket, name)| {
                let client = Arc::clone(&self.client);
                let handle = tokio::spawn(async move { client.fetch_current(&name).await });
                (id, ticket, handle)
            })
            .collect();

        let mut settled = Vec::with_capacity(handles.len());
        for (id, ticket, handle) in handles {
            let outcome = handle.await.unwrap_or_else(|e| {
                tracing::warn!(city = %id, error = %e, "Refresh task did not complete");
                Err(FetchError::Network(format!("refresh task failed: {e}")))
            });
            settled.push((id, ticket, outcome));
        }

        let mut state = self.state.lock();
        let now = (self.clock)();
        let mut failed = 0usize;
        let mut applied = 0usize;
        for (id, ticket, outcome) in settled {
            let is_err = outcome.is_err();
            if state.merge(&id, ticket, outcome, now) {
                applied += 1;
                failed += usize::from(is_err);
            }
        }
        tracing::info!(applied, failed, "Refreshed cities");

        if applied > 0 {
            self.commit(&state)
        } else {
            self.publish(&state);
            state.cities.clone()
        }
    }

    /// Persist and publish the committed state. Called with the lock held so
    /// writes land in the same order as the mutations.
    fn commit(&self, state: &State) -> Vec<City> {
        self.persist(&state.cities);
        self.publish(state);
        state.cities.clone()
    }

    fn persist(&self, cities: &[City]) {
        let result = serde_json::to_string(cities)
            .map_err(crate::error::StoreError::from)
            .and_then(|json| self.store.set(CITIES_KEY, &json));

        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to persist city collection");
        }
    }

    fn publish(&self, state: &State) {
        self.updates.send_replace(state.cities.clone());
    }
}

fn load_cities(store: &dyn KeyValueStore) -> Vec<City> {
    let raw = match store.get(CITIES_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            tracing::warn!(error = %e, "Could not read stored cities; starting empty");
            return Vec::new();
        }
    };

    let cities: Vec<City> = match serde_json::from_str(&raw) {
        Ok(cities) => cities,
        Err(e) => {
            tracing::warn!(error = %e, "Stored cities are corrupt; starting empty");
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    cities
        .into_iter()
        .filter(|c| {
            let fresh = seen.insert(c.id.clone());
            if !fresh {
                tracing::warn!(city = %c.id, "Dropping duplicate stored city");
            }
            fresh
        })
        .map(|mut c| {
            // No fetch survives a restart.
            c.is_loading = false;
            c
        })
        .collect()
}
