use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use discovery_core::backend::auth::load_token;
use discovery_core::discovery::{Resolution, SessionView};
use discovery_core::{
    AuthFlag, AuthGate, Config, DiscoveryBackend, Event, HttpBackend, InMemoryBackend, Profile,
    SessionEngine, SessionPhase, SystemClock,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

/// Longest idle wait between ticks, so day rollover is noticed while the
/// session sits on a completed countdown.
const MAX_IDLE: Duration = Duration::from_secs(30);

fn demo_roster() -> Vec<Profile> {
    let people = [
        ("demo-1", "Mira", 29, "Climbs on weekends, reads on weekdays."),
        ("demo-2", "Jonas", 33, "Bakes sourdough and argues about maps."),
        ("demo-3", "Ayla", 27, "Learning the cello, badly and happily."),
        ("demo-4", "Tomás", 31, "Night-train enthusiast."),
        ("demo-5", "Reza", 35, "Makes playlists for every mood."),
    ];
    people
        .iter()
        .map(|(id, name, age, bio)| {
            let mut profile = Profile::named(*id, *name);
            profile.age = Some(*age);
            profile.bio = Some((*bio).to_string());
            profile
        })
        .collect()
}

fn build_engine(demo: bool) -> Result<SessionEngine, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let clock = Arc::new(SystemClock);

    let backend: Arc<dyn DiscoveryBackend>;
    let auth: Arc<dyn AuthGate>;
    if demo {
        let server =
            InMemoryBackend::new(clock.clone(), demo_roster()).with_min_dwell(config.min_dwell());
        backend = Arc::new(server);
        auth = Arc::new(AuthFlag::default());
    } else {
        let token = load_token().unwrap_or_else(|e| {
            warn!(error = %e, "credential store unavailable");
            None
        });
        let mut http = HttpBackend::new(&config.api.base_url, config.timeout())?;
        if let Some(token) = token {
            http = http.with_token(token);
        }
        let http = Arc::new(http);
        backend = http.clone();
        auth = http;
    }

    Ok(SessionEngine::new(
        backend,
        auth,
        clock,
        config.engine_config(),
    ))
}

/// `discovery today`: load the session and print its summary.
pub async fn today(demo: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = build_engine(demo)?;
    engine.load().await?;
    let json = serde_json::to_string_pretty(&engine.view())?;
    println!("{json}");
    Ok(())
}

/// `discovery run`: interactive session on stdin.
pub async fn run(demo: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = build_engine(demo)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print_help();
    reload(&mut engine).await;

    loop {
        let wait = engine
            .timer_deadline()
            .and_then(|deadline| (deadline - Utc::now()).to_std().ok())
            .unwrap_or(MAX_IDLE)
            .min(MAX_IDLE);

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "i" => {
                        let resolution = engine.interest().await;
                        report(&resolution);
                    }
                    "p" => {
                        let resolution = engine.pass().await;
                        report(&resolution);
                    }
                    "s" => render(&engine.view()),
                    "r" => reload(&mut engine).await,
                    #[cfg(feature = "dev-reset")]
                    "x" => {
                        engine.reset_for_testing();
                        print_events(&mut engine);
                        reload(&mut engine).await;
                    }
                    "q" => break,
                    "" => {}
                    other => println!("unknown command '{other}'"),
                }
            }
            _ = tokio::time::sleep(wait) => {}
        }

        engine.tick();
        if engine.phase() == SessionPhase::Loading {
            print_events(&mut engine);
            reload(&mut engine).await;
        }
        print_events(&mut engine);
    }
    Ok(())
}

async fn reload(engine: &mut SessionEngine) {
    if let Err(failure) = engine.load().await {
        print_events(engine);
        println!("! {failure}");
        if failure.is_retryable() {
            println!("  type 'r' to retry");
        }
        return;
    }
    print_events(engine);
    render(&engine.view());
}

fn print_help() {
    let mut commands = String::from("i = interest, p = pass, s = status, r = reload, q = quit");
    if cfg!(feature = "dev-reset") {
        commands.push_str(", x = reset (dev)");
    }
    println!("{commands}");
}

fn report(resolution: &Resolution) {
    match resolution {
        Resolution::Accepted { .. } | Resolution::Stale => {}
        Resolution::Rejected(reason) => println!("! {}", reason.message()),
        Resolution::Failed(failure) => println!("! {failure}"),
    }
}

fn print_events(engine: &mut SessionEngine) {
    for event in engine.drain_events() {
        match event {
            Event::SessionLoaded {
                remaining, total, ..
            } => println!("-- {remaining} of {total} profiles left today"),
            Event::ViewStarted { .. } | Event::SessionReset { .. } => {}
            Event::ViewCompleted { .. } => println!("   interest unlocked"),
            Event::DecisionAccepted {
                kind,
                free_pick_consumed,
                ..
            } => {
                if free_pick_consumed {
                    println!("   {kind} recorded (free pick used)");
                } else {
                    println!("   {kind} recorded");
                }
                render(&engine.view());
            }
            Event::DecisionRejected { .. }
            | Event::StaleResponseDiscarded { .. }
            | Event::SessionFailed { .. } => {}
            Event::SessionCompleted {
                viewed_count,
                interested_count,
                ..
            } => println!(
                "-- all done for today: {viewed_count} viewed, {interested_count} interested"
            ),
            Event::DayRolledOver { current, .. } => println!("-- new day ({current}), reloading"),
        }
    }
}

fn render(view: &SessionView) {
    let Some(profile) = &view.profile else {
        if view.phase == SessionPhase::Complete {
            println!(
                "   {}/{} viewed, {} interested. Come back tomorrow.",
                view.viewed_count, view.total, view.interested_count
            );
        }
        return;
    };

    let mut header = format!("\n[{}/{}] {}", view.viewed_count + 1, view.total, profile.name);
    if let Some(age) = profile.age {
        header.push_str(&format!(", {age}"));
    }
    println!("{header}");
    if let Some(bio) = &profile.bio {
        println!("    {bio}");
    }

    let interest = if view.locked {
        format!("locked, {}s left", view.remaining_secs)
    } else if view.is_free_pick {
        "available (uses today's free pick)".to_string()
    } else {
        "available".to_string()
    };
    println!("    interest: {interest}");
}
