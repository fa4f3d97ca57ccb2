use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Local};
use serde::Deserialize;
use std::fs::OpenOptions;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

mod config;
mod error;
mod models;
mod nutrients;
mod projections;
mod windows;


use config::Config;
use error::{AppError, AppResult};
use models::{ActivityInput, ApiResponse, LoggedRecord, MealInput, QueryResult, RecordKind};
use nutrients::{compute_deficit, logged_totals, Nutrients};
use projections::{activity_summary, insight_prompt, Recommendation, SeriesSummary};
use windows::{filter_by_window, TimeWindow};

/// Source of "now" for window filtering; fixed in tests.
type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

/// Records live in append-only logs, one JSON object per line.
/// Every projection is recomputed from the full log on each request.
#[derive(Clone)]
struct AppState {
    data_dir: PathBuf,
    activity_categories: Arc<Vec<String>>,
    meal_categories: Arc<Vec<String>>,
    goals: Nutrients,
    clock: Clock,
}

impl AppState {
    fn new(config: Config, clock: Clock) -> Self {
        Self {
            data_dir: config.data_dir,
            activity_categories: Arc::new(config.activity_categories),
            meal_categories: Arc::new(config.meal_categories),
            goals: config.goals,
            clock,
        }
    }

    fn log_path(&self, kind: RecordKind) -> PathBuf {
        self.data_dir.join(kind.log_file())
    }

    fn load(&self, kind: RecordKind) -> AppResult<Vec<LoggedRecord>> {
        read_records(&self.log_path(kind))
    }

    fn now(&self) -> DateTime<Local> {
        (self.clock)()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::from_env()?;
    let addr = config.addr;
    info!(
        "data dir {}, {} activity categories, {} meal categories",
        config.data_dir.display(),
        config.activity_categories.len(),
        config.meal_categories.len()
    );

    let clock: Clock = Arc::new(Local::now);
    let app = router(AppState::new(config, clock));

    info!("server running on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Log filter from `FITTRACK_LOG_LEVEL`, then `RUST_LOG`, then `info`.
fn init_tracing() {
    let log_env = std::env::var("FITTRACK_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());

    let env_filter = tracing_subscriber::EnvFilter::try_new(&log_env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
    info!("log filter: {}", log_env);
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/activities", get(list_activities).post(create_activity))
        .route("/activities/series", get(activity_series))
        .route("/activities/recommendations", get(activity_recommendations))
        .route("/activities/insight", get(activity_insight))
        .route("/meals", get(list_meals).post(create_meal))
        .route("/meals/series", get(meal_series))
        .route("/meals/recommendations", get(meal_recommendations))
        .route("/meals/deficit", get(meal_deficit).post(meal_deficit_with_goals))
        .route("/query", post(handle_query))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
struct WindowQuery {
    window: Option<String>,
}

impl WindowQuery {
    fn parse(&self) -> AppResult<Option<TimeWindow>> {
        self.window.as_deref().map(str::parse).transpose()
    }

    fn parse_or(&self, default: TimeWindow) -> AppResult<TimeWindow> {
        Ok(self.parse()?.unwrap_or(default))
    }
}

#[derive(Debug, Deserialize)]
struct DeficitRequest {
    #[serde(default)]
    goals: Nutrients,
    #[serde(default)]
    window: Option<String>,
}

async fn root() -> &'static str {
    "Fitness Tracker API v0.1.0"
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": state.now().to_rfc3339(),
    }))
}

/// Log an activity; timestamped now, calories estimated from the type.
async fn create_activity(
    State(state): State<AppState>,
    Json(input): Json<ActivityInput>,
) -> AppResult<Json<ApiResponse>> {
    if input.activity.trim().is_empty() {
        return Err(AppError::Validation("activity must not be empty".into()));
    }
    if !input.duration.is_finite() || input.duration <= 0.0 {
        return Err(AppError::Validation(format!(
            "duration must be a positive number of minutes, got {}",
            input.duration
        )));
    }

    let record = input.into_record(state.now().timestamp_millis());
    append_record(&state.log_path(RecordKind::Activity), &record)?;
    info!(
        "activity logged: {} for {} mins",
        record.category.as_deref().unwrap_or_default(),
        record.quantity.unwrap_or_default()
    );

    Ok(Json(ApiResponse {
        status: "success".to_string(),
        message: "Activity logged successfully".to_string(),
        data: Some(serde_json::json!({ "record": record })),
    }))
}

async fn list_activities(State(state): State<AppState>) -> AppResult<Json<Vec<LoggedRecord>>> {
    Ok(Json(state.load(RecordKind::Activity)?))
}

async fn activity_series(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> AppResult<Json<SeriesSummary>> {
    let window = query.parse_or(TimeWindow::Week)?;
    series_for(&state, RecordKind::Activity, window).map(Json)
}

async fn activity_recommendations(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> AppResult<Json<Recommendation>> {
    let window = query.parse_or(TimeWindow::Week)?;
    recommendations_for(&state, RecordKind::Activity, window).map(Json)
}

/// Summary and prompt for the external text-completion service.
async fn activity_insight(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let records = state.load(RecordKind::Activity)?;
    let summary = activity_summary(&records);
    let prompt = if summary.is_empty() {
        None
    } else {
        Some(insight_prompt(&summary))
    };

    Ok(Json(serde_json::json!({
        "summary": summary,
        "prompt": prompt,
        "has_data": !records.is_empty(),
    })))
}

/// Log a meal; timestamped now.
async fn create_meal(
    State(state): State<AppState>,
    Json(input): Json<MealInput>,
) -> AppResult<Json<ApiResponse>> {
    if input.food_name.trim().is_empty() || input.meal_type.trim().is_empty() {
        return Err(AppError::Validation("food name and meal type are required".into()));
    }
    if !input.calories.is_finite() || input.calories <= 0.0 {
        return Err(AppError::Validation(format!(
            "calories must be positive, got {}",
            input.calories
        )));
    }

    let record = input.into_record(state.now().timestamp_millis());
    append_record(&state.log_path(RecordKind::Meal), &record)?;
    info!(
        "meal logged: {} ({})",
        record.label.as_deref().unwrap_or_default(),
        record.category.as_deref().unwrap_or_default()
    );

    Ok(Json(ApiResponse {
        status: "success".to_string(),
        message: "Meal logged successfully".to_string(),
        data: Some(serde_json::json!({ "record": record })),
    }))
}

async fn list_meals(State(state): State<AppState>) -> AppResult<Json<Vec<LoggedRecord>>> {
    Ok(Json(state.load(RecordKind::Meal)?))
}

async fn meal_recommendations(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> AppResult<Json<Recommendation>> {
    let window = query.parse_or(TimeWindow::Day)?;
    recommendations_for(&state, RecordKind::Meal, window).map(Json)
}

async fn meal_series(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> AppResult<Json<SeriesSummary>> {
    let window = query.parse_or(TimeWindow::Day)?;
    series_for(&state, RecordKind::Meal, window).map(Json)
}

/// Deficit against the configured goals. Without a window every meal counts.
async fn meal_deficit(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let window = query.parse()?;
    deficit_for(&state, &state.goals, window).map(Json)
}

async fn meal_deficit_with_goals(
    State(state): State<AppState>,
    Json(request): Json<DeficitRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let window = WindowQuery {
        window: request.window,
    }
    .parse()?;
    deficit_for(&state, &request.goals, window).map(Json)
}

/// Handle free-form queries
async fn handle_query(
    State(state): State<AppState>,
    Json(query): Json<serde_json::Value>,
) -> AppResult<Json<QueryResult>> {
    let query_str = query.get("query").and_then(|v| v.as_str()).unwrap_or("");

    // Route to appropriate projection
    let (result_type, data) = if query_str.contains("recommend") {
        let recommendation = recommendations_for(&state, RecordKind::Activity, TimeWindow::Week)?;
        ("recommendations", serde_json::to_value(recommendation)?)
    } else if query_str.contains("nutrient") || query_str.contains("deficit") {
        ("deficit", deficit_for(&state, &state.goals, Some(TimeWindow::Day))?)
    } else if query_str.contains("series") || query_str.contains("chart") {
        let summary = series_for(&state, RecordKind::Activity, TimeWindow::Week)?;
        ("series", serde_json::to_value(summary)?)
    } else {
        // Default: return recent records
        let now = state.now();
        let activities = state.load(RecordKind::Activity)?;
        let meals = state.load(RecordKind::Meal)?;
        (
            "recent",
            serde_json::json!({
                "activities": filter_by_window(&activities, TimeWindow::Day, &now),
                "meals": filter_by_window(&meals, TimeWindow::Day, &now),
            }),
        )
    };

    Ok(Json(QueryResult {
        query: query_str.to_string(),
        result_type: result_type.to_string(),
        data,
    }))
}

fn series_for(state: &AppState, kind: RecordKind, window: TimeWindow) -> AppResult<SeriesSummary> {
    let now = state.now();
    let records = state.load(kind)?;
    let filtered = filter_by_window(&records, window, &now);
    Ok(SeriesSummary::build(window, &filtered))
}

fn recommendations_for(
    state: &AppState,
    kind: RecordKind,
    window: TimeWindow,
) -> AppResult<Recommendation> {
    let known = match kind {
        RecordKind::Activity => &state.activity_categories,
        RecordKind::Meal => &state.meal_categories,
    };
    let now = state.now();
    let records = state.load(kind)?;
    let filtered = filter_by_window(&records, window, &now);
    Ok(Recommendation::build(filtered, known))
}

fn deficit_for(
    state: &AppState,
    goals: &Nutrients,
    window: Option<TimeWindow>,
) -> AppResult<serde_json::Value> {
    let records = state.load(RecordKind::Meal)?;
    let meals: Vec<&LoggedRecord> = match window {
        Some(window) => filter_by_window(&records, window, &state.now()),
        None => records.iter().collect(),
    };

    let logged = logged_totals(meals.iter().copied());
    let deficit = compute_deficit(meals.iter().copied(), goals);

    Ok(serde_json::json!({
        "window": window,
        "meal_count": meals.len(),
        "goals": goals,
        "logged": logged,
        "remaining": deficit.remaining,
        "most_deficient": deficit.most_deficient,
    }))
}

// Helper functions

fn append_record(path: &Path, record: &LoggedRecord) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut line = serde_json::to_string(record)?;
    line.push('\n');

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    Ok(())
}

/// Reads every record in a log. A log that does not exist yet is empty;
/// lines that do not parse are skipped.
fn read_records(path: &Path) -> AppResult<Vec<LoggedRecord>> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let reader = std::io::BufReader::new(file);

    let mut records = Vec::new();
    // Split on raw bytes: a line that is not UTF-8 is skipped like any other
    // unparseable line, only real read errors fail the load.
    for (idx, line) in reader.split(b'\n').enumerate() {
        let line = line?;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<LoggedRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => warn!("{}:{}: skipping unreadable record: {}", path.display(), idx + 1, e),
        }
    }

    Ok(records)
}
