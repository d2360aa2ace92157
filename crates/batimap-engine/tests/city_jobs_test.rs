use async_trait::async_trait;
use batimap_core::config::Settings;
use batimap_core::error::{BatimapError, Result};
use batimap_core::models::{Bbox, BuildingRecord, City, ElementKind, JobState, StatusLabel};
use batimap_core::ports::{BuildingQuery, CadastreFreshness, CadastreGenerator, LineStream};
use batimap_engine::{Batimap, Collaborators, ObsoleteQuery};
use batimap_store::{
    Boundary, CityRepository, MemoryCityRepository, RecordingTiles, StaticCadastreSource, StaticOpenData, TileEvent,
};
use chrono::{Duration, Utc};
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Holds every query until a permit is released
struct GatedQuery {
    inner: MemoryCityRepository,
    gate: Arc<Semaphore>,
    calls: Mutex<usize>,
}

#[async_trait]
impl BuildingQuery for GatedQuery {
    async fn city_buildings(&self, insee: &str, ignored: &[String]) -> Result<Vec<BuildingRecord>> {
        *self.calls.lock().unwrap() += 1;
        let _permit = self.gate.acquire().await.unwrap();
        self.inner.city_buildings(insee, ignored).await
    }
}

/// Prints a canned log and publishes fresh data on the cadastre side
struct ScriptedGenerator {
    cadastre: StaticCadastreSource,
    lines: Vec<String>,
    forced: Mutex<Vec<bool>>,
}

#[async_trait]
impl CadastreGenerator for ScriptedGenerator {
    async fn generate<'a>(&'a self, city: &'a City, force: bool) -> Result<LineStream<'a>> {
        self.forced.lock().unwrap().push(force);
        if let Some(name) = &city.name_cadastre {
            self.cadastre.set_freshness(
                &city.department,
                vec![CadastreFreshness {
                    name_cadastre: name.clone(),
                    generated_at: Utc::now(),
                }],
            );
        }
        Ok(futures::stream::iter(self.lines.clone().into_iter().map(Ok)).boxed())
    }
}

struct Fixture {
    repo: MemoryCityRepository,
    cadastre: StaticCadastreSource,
    tiles: RecordingTiles,
    query: Arc<GatedQuery>,
    generator: Arc<ScriptedGenerator>,
    batimap: Batimap,
}

fn fixture(log: &[&str]) -> Fixture {
    let repo = MemoryCityRepository::new();
    let cadastre = StaticCadastreSource::new();
    let tiles = RecordingTiles::new();
    let query = Arc::new(GatedQuery {
        inner: repo.clone(),
        gate: Arc::new(Semaphore::new(Semaphore::MAX_PERMITS)),
        calls: Mutex::new(0),
    });
    let generator = Arc::new(ScriptedGenerator {
        cadastre: cadastre.clone(),
        lines: log.iter().map(|l| l.to_string()).collect(),
        forced: Mutex::new(Vec::new()),
    });
    let settings = Settings {
        min_buildings: 3,
        cadastre_url: "https://cadastre.example.org".into(),
        workers: 2,
        ..Settings::default()
    };
    let batimap = Batimap::new(
        Collaborators {
            repo: Arc::new(repo.clone()),
            query: query.clone(),
            cadastre: Arc::new(cadastre.clone()),
            open_data: Arc::new(StaticOpenData::new()),
            tiles: Arc::new(tiles.clone()),
            generator: generator.clone(),
        },
        &settings,
    );
    Fixture {
        repo,
        cadastre,
        tiles,
        query,
        generator,
        batimap,
    }
}

async fn seed_city(fx: &Fixture, insee: &str, year: &str) -> City {
    let mut city = City::new(insee, "Cobonne");
    city.name_cadastre = Some("CL098-COBONNE".into());
    fx.repo.save_city(&city).await.unwrap();
    fx.repo.insert_boundary(Boundary {
        insee: insee.into(),
        name: "Cobonne".into(),
        bbox: Bbox::new(5.0, 44.7, 5.1, 44.8),
    });
    fx.repo.insert_buildings(
        insee,
        (1..=4)
            .map(|id| BuildingRecord {
                id,
                kind: ElementKind::Way,
                tags: [("building".to_string(), "yes".to_string())].into(),
                timestamp: Some(format!("{}-01-01T00:00:00Z", year)),
            })
            .collect(),
    );
    city
}

#[tokio::test]
async fn test_concurrent_updates_share_one_job() {
    let fx = fixture(&[]);
    seed_city(&fx, "26400", "2016").await;
    fx.query.gate.forget_permits(Semaphore::MAX_PERMITS);

    let first = fx.batimap.request_city_update("26400").await.unwrap();
    let second = fx.batimap.request_city_update("26400").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(fx.batimap.list_jobs().len(), 1);

    fx.query.gate.add_permits(1);
    let status = fx.batimap.runner().wait(first).await.unwrap();
    assert_eq!(status.state, JobState::Success);
    assert_eq!(status.result.unwrap()["date"], "2016");
    assert_eq!(*fx.query.calls.lock().unwrap(), 1);

    // label changed from never, the city box is stale
    assert_eq!(fx.tiles.events(), vec![TileEvent::Bbox(Bbox::new(5.0, 44.7, 5.1, 44.8))]);
}

#[tokio::test]
async fn test_update_unknown_city_is_refused() {
    let fx = fixture(&[]);
    let err = fx.batimap.request_city_update("99999").await.unwrap_err();
    assert!(matches!(err, BatimapError::CityNotFound { .. }));
}

#[tokio::test]
async fn test_editable_data_generation() {
    let fx = fixture(&[
        "CL098-COBONNE: coupe la bbox en 1 * 2 [2 pdfs]",
        "CL098-COBONNE-1-0-1.pdf",
        "Terminé",
    ]);
    let generated_at = Utc::now() - Duration::days(90);
    let mut city = seed_city(&fx, "26400", "2013").await;
    city.date_cadastre = Some(generated_at);
    fx.repo.save_city(&city).await.unwrap();
    fx.cadastre.set_freshness(
        "26",
        vec![CadastreFreshness {
            name_cadastre: "CL098-COBONNE".into(),
            generated_at,
        }],
    );

    let id = fx.batimap.request_josm_data("26400").await.unwrap();
    let status = fx.batimap.runner().wait(id).await.unwrap();

    assert_eq!(status.state, JobState::Success);
    assert_eq!(status.key.kind.name(), "task_josm_data");
    let data = status.result.unwrap();
    assert_eq!(
        data["buildingsUrl"],
        "https://cadastre.example.org/data/026/CL098-COBONNE-houses-simplifie.osm"
    );
    assert_eq!(data["date"], "2013");
    assert_eq!(data["bbox"], serde_json::json!([5.0, 5.1, 44.7, 44.8]));

    // stale data already existed, so generation was forced
    assert_eq!(*fx.generator.forced.lock().unwrap(), vec![true]);
    let stored = fx.repo.get_city("26400").await.unwrap().unwrap();
    assert!(stored.is_josm_ready(Utc::now(), 30));
    assert_eq!(stored.import_date, StatusLabel::Year(2013));
    assert!(!fx.tiles.events().is_empty());
}

#[tokio::test]
async fn test_fresh_city_takes_fast_path() {
    let fx = fixture(&[]);
    let mut city = seed_city(&fx, "26400", "2013").await;
    city.date_cadastre = Some(Utc::now() - Duration::days(1));
    fx.repo.save_city(&city).await.unwrap();

    let id = fx.batimap.request_josm_data("26400").await.unwrap();
    let status = fx.batimap.runner().wait(id).await.unwrap();

    assert_eq!(status.state, JobState::Success);
    assert_eq!(status.key.kind.name(), "task_josm_data_fast");
    assert!(fx.generator.forced.lock().unwrap().is_empty());
    assert!(status.result.unwrap()["segmentationPredictionsUrl"]
        .as_str()
        .unwrap()
        .ends_with("CL098-COBONNE-houses-prediction_segmente.osm"));
}

#[tokio::test]
async fn test_fast_path_refuses_stale_data() {
    let fx = fixture(&[]);
    seed_city(&fx, "26400", "2013").await;

    let err = fx
        .batimap
        .city_jobs()
        .prepare_editable_data_fast("26400", &batimap_engine::NoopProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, BatimapError::NotReady { .. }));
}

#[tokio::test]
async fn test_raster_city_has_no_editable_data() {
    let fx = fixture(&[]);
    let mut city = City::new("26401", "Combovin");
    city.is_raster = true;
    fx.repo.save_city(&city).await.unwrap();

    let err = fx.batimap.request_josm_data("26401").await.unwrap_err();
    assert!(matches!(err, BatimapError::RasterCity { .. }));
}

#[tokio::test]
async fn test_generation_error_fails_the_job() {
    let fx = fixture(&["ERREUR: impossible de joindre le site du cadastre"]);
    seed_city(&fx, "26400", "2013").await;

    let id = fx.batimap.request_josm_data("26400").await.unwrap();
    let status = fx.batimap.runner().wait(id).await.unwrap();

    assert_eq!(status.state, JobState::Failure);
    let error = status.result.unwrap()["error"].as_str().unwrap().to_string();
    assert!(error.contains("impossible de joindre"));
    // first generation for this city
    assert_eq!(*fx.generator.forced.lock().unwrap(), vec![false]);
}

#[tokio::test]
async fn test_pick_obsolete_city_returns_dto() {
    let fx = fixture(&[]);
    seed_city(&fx, "26400", "2013").await;
    let mut dated = City::new("26401", "Combovin");
    dated.import_date = StatusLabel::Year(2012);
    fx.repo.save_city(&dated).await.unwrap();

    let picked = fx.batimap.pick_obsolete_city(&ObsoleteQuery::default()).await.unwrap().unwrap();
    assert_eq!(picked.insee, "26400");
    assert_eq!(picked.date, StatusLabel::Never);
    assert!(!picked.josm_ready);

    let query = ObsoleteQuery {
        excluded_labels: [StatusLabel::Never].into(),
        ..Default::default()
    };
    let picked = fx.batimap.pick_obsolete_city(&query).await.unwrap().unwrap();
    assert_eq!(picked.insee, "26401");
}

#[tokio::test]
async fn test_stats_fast_and_live() {
    let fx = fixture(&[]);
    seed_city(&fx, "26400", "2016").await;

    let fast = fx.batimap.stats(&["26400".to_string()], true, false).await.unwrap();
    assert_eq!(fast.len(), 1);
    assert_eq!(fast[0].date, StatusLabel::Never);

    let live = fx.batimap.stats(&["Cobonne".to_string()], false, false).await.unwrap();
    assert_eq!(live[0].date, StatusLabel::Year(2016));
    assert_eq!(live[0].osm_buildings, 4);
}
