//! The effect loops.
//!
//! Every loop polls its cancellation token at iteration boundaries and
//! exits gracefully, finishing the current step rather than the next one.
//! Command failures are never fatal here: a transient disconnect is logged
//! and skipped, and the effect picks up again once the link manager has
//! reconnected.

use std::time::Duration;

use log::{debug, info};
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::{
    color::{self, Rgb},
    controller::LedController,
};

use super::{EffectSpec, palette};

pub async fn run_effect(controller: LedController, spec: EffectSpec, cancel: CancellationToken) {
    let name = spec.name();
    info!("Effect '{name}' started");

    match spec {
        EffectSpec::Rainbow => rainbow(&controller, &cancel).await,
        EffectSpec::Breathing { color } => breathing(&controller, &cancel, color).await,
        EffectSpec::Strobe { color } => strobe(&controller, &cancel, color).await,
        EffectSpec::Police => police(&controller, &cancel).await,
        EffectSpec::Fire => fire(&controller, &cancel).await,
        EffectSpec::Aurora => aurora(&controller, &cancel).await,
        EffectSpec::Fade {
            colors,
            speed,
            steps,
        } => {
            let colors = colors.unwrap_or_else(|| palette::FADE_DEFAULT.to_vec());
            let delay = Duration::from_secs_f32(0.05 / speed);
            cycle_palette(&controller, &cancel, &colors, steps, delay).await;
        }
        EffectSpec::Wave { speed } => {
            let delay = Duration::from_secs_f32(0.1 / speed);
            cycle_palette(&controller, &cancel, &palette::WAVE, 80, delay).await;
        }
        EffectSpec::Blink {
            color,
            count,
            speed,
        } => blink(&controller, &cancel, color, count, speed).await,
        EffectSpec::Pomodoro {
            work_minutes,
            break_minutes,
            cycles,
        } => pomodoro(&controller, &cancel, work_minutes, break_minutes, cycles).await,
    }

    info!("Effect '{name}' stopped");
}

/// Submits a color, skipping (not aborting) on failure.
async fn apply_color(controller: &LedController, rgb: Rgb) {
    if let Err(e) = controller.set_color(rgb).await {
        debug!("Effect color command skipped: {e}");
    }
}

/// Submits a brightness, skipping (not aborting) on failure.
async fn apply_brightness(controller: &LedController, pct: u8) {
    if let Err(e) = controller.set_brightness(pct).await {
        debug!("Effect brightness command skipped: {e}");
    }
}

async fn current_color(controller: &LedController) -> Rgb {
    controller.snapshot().await.color
}

async fn rainbow(controller: &LedController, cancel: &CancellationToken) {
    while !cancel.is_cancelled() {
        for rgb in palette::RAINBOW {
            if cancel.is_cancelled() {
                return;
            }
            apply_color(controller, rgb).await;
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }
}

async fn breathing(controller: &LedController, cancel: &CancellationToken, color: Option<Rgb>) {
    let base = match color {
        Some(rgb) => rgb,
        None => current_color(controller).await,
    };
    apply_color(controller, base).await;

    let ramp: Vec<u8> = (0..=100).step_by(5).collect();
    while !cancel.is_cancelled() {
        for &pct in ramp.iter().chain(ramp.iter().rev()) {
            if cancel.is_cancelled() {
                break;
            }
            apply_brightness(controller, pct).await;
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
    apply_brightness(controller, 100).await;
}

async fn strobe(controller: &LedController, cancel: &CancellationToken, color: Option<Rgb>) {
    let base = match color {
        Some(rgb) => rgb,
        None => current_color(controller).await,
    };

    while !cancel.is_cancelled() {
        apply_color(controller, base).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        if cancel.is_cancelled() {
            break;
        }
        apply_color(controller, color::BLACK).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    apply_color(controller, base).await;
}

async fn police(controller: &LedController, cancel: &CancellationToken) {
    while !cancel.is_cancelled() {
        apply_color(controller, color::RED).await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        if cancel.is_cancelled() {
            break;
        }
        apply_color(controller, color::BLUE).await;
        tokio::time::sleep(Duration::from_millis(300)).await;
    }
}

async fn fire(controller: &LedController, cancel: &CancellationToken) {
    while !cancel.is_cancelled() {
        let (rgb, brightness, delay) = flicker();
        apply_color(controller, rgb).await;
        apply_brightness(controller, brightness).await;
        tokio::time::sleep(delay).await;
    }
    apply_brightness(controller, 100).await;
}

/// One flame step: weighted palette pick, per-channel jitter, band-keyed
/// brightness and delay.
fn flicker() -> (Rgb, u8, Duration) {
    let mut rng = rand::rng();
    let entry = palette::pick_flame(rng.random_range(0..palette::fire_total_weight()));
    let rgb = Rgb::saturating(
        i32::from(entry.color.r) + rng.random_range(-10..=10),
        i32::from(entry.color.g) + rng.random_range(-15..=15),
        i32::from(entry.color.b) + rng.random_range(-5..=5),
    );
    let brightness = rng.random_range(entry.band.brightness_range());
    let delay = Duration::from_millis(rng.random_range(entry.band.delay_ms_range()));
    (rgb, brightness, delay)
}

async fn aurora(controller: &LedController, cancel: &CancellationToken) {
    const STEPS: u32 = 10;
    let mut index = 0;

    while !cancel.is_cancelled() {
        let target = palette::AURORA[index];
        let start = current_color(controller).await;

        for i in 0..=STEPS {
            if cancel.is_cancelled() {
                break;
            }
            apply_color(controller, start.lerp(target, i, STEPS)).await;
            apply_brightness(controller, sample_range_u8(70..=100)).await;
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        if cancel.is_cancelled() {
            break;
        }

        // Linger on the reached color before drifting onward.
        tokio::time::sleep(Duration::from_millis(sample_range_u64(1500..=3000))).await;
        index = (index + 1) % palette::AURORA.len();
    }
    apply_brightness(controller, 100).await;
}

/// Shared loop for fade and wave: interpolate between consecutive palette
/// colors, cyclically, forever.
async fn cycle_palette(
    controller: &LedController,
    cancel: &CancellationToken,
    colors: &[Rgb],
    steps: u32,
    delay: Duration,
) {
    let mut index = 0;
    while !cancel.is_cancelled() {
        let start = colors[index];
        let next = (index + 1) % colors.len();
        let target = colors[next];

        for i in 0..=steps {
            if cancel.is_cancelled() {
                return;
            }
            apply_color(controller, start.lerp(target, i, steps)).await;
            tokio::time::sleep(delay).await;
        }
        index = next;
    }
}

async fn blink(
    controller: &LedController,
    cancel: &CancellationToken,
    color: Option<Rgb>,
    count: u32,
    speed: f32,
) {
    let base = match color {
        Some(rgb) => rgb,
        None => current_color(controller).await,
    };
    let delay = Duration::from_secs_f32(0.3 / speed);

    let mut done = 0;
    while !cancel.is_cancelled() && (count == 0 || done < count) {
        apply_color(controller, base).await;
        tokio::time::sleep(delay).await;
        if cancel.is_cancelled() {
            break;
        }
        apply_color(controller, color::BLACK).await;
        tokio::time::sleep(delay).await;
        done += 1;
    }
    apply_color(controller, base).await;
}

async fn pomodoro(
    controller: &LedController,
    cancel: &CancellationToken,
    work_minutes: u32,
    break_minutes: u32,
    cycles: u32,
) {
    let mut completed = true;

    'cycles: for cycle in 1..=cycles {
        info!("Pomodoro cycle {cycle}/{cycles}: work phase ({work_minutes} min)");
        apply_color(controller, color::WHITE).await;
        apply_brightness(controller, 100).await;
        if wait_minutes(work_minutes, cancel).await {
            completed = false;
            break;
        }

        // End-of-work alert.
        for _ in 0..3 {
            if cancel.is_cancelled() {
                completed = false;
                break 'cycles;
            }
            flash(controller, color::GREEN).await;
        }

        if cycle < cycles {
            info!("Pomodoro cycle {cycle}/{cycles}: break phase ({break_minutes} min)");
            apply_color(controller, color::GREEN).await;
            apply_brightness(controller, 70).await;
            if wait_minutes(break_minutes, cancel).await {
                completed = false;
                break;
            }

            // End-of-break alert.
            for _ in 0..2 {
                if cancel.is_cancelled() {
                    completed = false;
                    break 'cycles;
                }
                flash(controller, color::YELLOW).await;
            }
        }
    }

    if completed {
        info!("Pomodoro session complete: {cycles} cycles");
        for _ in 0..5 {
            if cancel.is_cancelled() {
                break;
            }
            apply_color(controller, celebration_color()).await;
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
    }

    // Defined idle state, whether the session completed or was cancelled.
    apply_color(controller, color::WHITE).await;
    apply_brightness(controller, 100).await;
}

async fn flash(controller: &LedController, rgb: Rgb) {
    apply_color(controller, rgb).await;
    tokio::time::sleep(Duration::from_millis(500)).await;
    apply_color(controller, color::BLACK).await;
    tokio::time::sleep(Duration::from_millis(500)).await;
}

/// Waits out a phase in 1s slices so cancellation is observed promptly.
///
/// Returns true if cancellation cut the wait short.
async fn wait_minutes(minutes: u32, cancel: &CancellationToken) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(u64::from(minutes) * 60);
    loop {
        if cancel.is_cancelled() {
            return true;
        }
        let now = tokio::time::Instant::now();
        if now >= deadline {
            return false;
        }
        let slice = (deadline - now).min(Duration::from_secs(1));
        tokio::time::sleep(slice).await;
    }
}

fn sample_range_u8(range: std::ops::RangeInclusive<u8>) -> u8 {
    rand::rng().random_range(range)
}

fn sample_range_u64(range: std::ops::RangeInclusive<u64>) -> u64 {
    rand::rng().random_range(range)
}

fn celebration_color() -> Rgb {
    let mut rng = rand::rng();
    Rgb::new(
        rng.random_range(100..=255),
        rng.random_range(100..=255),
        rng.random_range(100..=255),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        drivers::bledom::{Command, DeviceSnapshot, LinkRequest, LinkState, link::LinkHandles},
        error::CommandError,
        stats::Stats,
    };
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};
    use tokio::sync::{RwLock, mpsc};

    /// Controller wired to an in-test link task that records commands.
    /// `fail_first` initial commands are answered with WriteFailed.
    fn harness(fail_first: usize) -> (LedController, Arc<Mutex<Vec<Command>>>, Arc<Stats>) {
        let (tx, mut rx) = mpsc::channel(16);
        let stats = Arc::new(Stats::new());
        let handles = LinkHandles {
            requests: tx,
            state: Arc::new(RwLock::new(LinkState::Connected)),
            snapshot: Arc::new(RwLock::new(DeviceSnapshot::default())),
        };
        let commands = Arc::new(Mutex::new(Vec::new()));
        let recorded = commands.clone();

        tokio::spawn(async move {
            let mut answered = 0usize;
            while let Some(LinkRequest::Execute { command, reply }) = rx.recv().await {
                if answered < fail_first {
                    let _ = reply.send(Err(CommandError::WriteFailed("link down".to_string())));
                } else {
                    recorded.lock().unwrap().push(command);
                    let _ = reply.send(Ok(()));
                }
                answered += 1;
            }
        });

        let controller = LedController::new(handles, stats.clone(), Duration::from_secs(2));
        (controller, commands, stats)
    }

    fn colors_of(commands: &[Command]) -> Vec<Rgb> {
        commands
            .iter()
            .filter_map(|c| match c {
                Command::Color { rgb } => Some(*rgb),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn strobe_alternates_and_restores_its_color() {
        let (controller, commands, _stats) = harness(0);
        let cancel = CancellationToken::new();
        let base = Rgb::new(9, 9, 9);

        let task = tokio::spawn(run_effect(
            controller,
            EffectSpec::Strobe { color: Some(base) },
            cancel.clone(),
        ));
        tokio::time::sleep(Duration::from_millis(450)).await;
        cancel.cancel();
        task.await.unwrap();

        let commands = commands.lock().unwrap();
        let colors = colors_of(&commands);
        assert!(colors.len() >= 3);
        assert!(colors.contains(&color::BLACK));
        // Restorative final command.
        assert_eq!(*colors.last().unwrap(), base);
    }

    #[tokio::test(start_paused = true)]
    async fn breathing_ramps_in_steps_of_five_and_restores_full() {
        let (controller, commands, _stats) = harness(0);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_effect(
            controller,
            EffectSpec::Breathing {
                color: Some(color::BLUE),
            },
            cancel.clone(),
        ));
        tokio::time::sleep(Duration::from_millis(400)).await;
        cancel.cancel();
        task.await.unwrap();

        let commands = commands.lock().unwrap();
        assert_eq!(commands[0], Command::color(color::BLUE));
        let ramp: Vec<u8> = commands
            .iter()
            .filter_map(|c| match c {
                Command::Brightness { pct } => Some(*pct),
                _ => None,
            })
            .collect();
        assert!(ramp.len() >= 3);
        assert_eq!(&ramp[..3], &[0, 5, 10]);
        assert_eq!(*ramp.last().unwrap(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn effect_survives_command_failures_and_resumes() {
        let (controller, commands, stats) = harness(4);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_effect(controller, EffectSpec::Rainbow, cancel.clone()));
        tokio::time::sleep(Duration::from_secs(8)).await;
        cancel.cancel();
        task.await.unwrap();

        // The loop outlived the failures and kept issuing commands.
        assert!(!commands.lock().unwrap().is_empty());
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.commands_failed, 4);
        assert!(snapshot.commands_sent >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn blink_is_bounded_and_restores_color() {
        let (controller, commands, _stats) = harness(0);
        let cancel = CancellationToken::new();
        let base = Rgb::new(40, 0, 40);

        run_effect(
            controller,
            EffectSpec::Blink {
                color: Some(base),
                count: 3,
                speed: 1.0,
            },
            cancel,
        )
        .await;

        let commands = commands.lock().unwrap();
        let colors = colors_of(&commands);
        // (on, off) x3 plus the restore.
        assert_eq!(colors.len(), 7);
        assert_eq!(colors.iter().filter(|c| **c == color::BLACK).count(), 3);
        assert_eq!(*colors.last().unwrap(), base);
    }

    #[tokio::test(start_paused = true)]
    async fn fire_stays_within_the_warm_envelope() {
        let (controller, commands, _stats) = harness(0);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_effect(controller, EffectSpec::Fire, cancel.clone()));
        tokio::time::sleep(Duration::from_secs(3)).await;
        cancel.cancel();
        task.await.unwrap();

        let commands = commands.lock().unwrap();
        let colors = colors_of(&commands);
        assert!(colors.len() >= 10);
        for rgb in &colors {
            // Palette min red 180 minus max jitter 10; blue max 200 + 5.
            assert!(rgb.r >= 170, "flame red too low: {rgb:?}");
            assert!(rgb.b <= 205, "flame blue too high: {rgb:?}");
        }
        for command in commands.iter() {
            if let Command::Brightness { pct } = command {
                assert!((60..=100).contains(pct));
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn pomodoro_completes_into_white_at_full_brightness() {
        let (controller, commands, _stats) = harness(0);
        let cancel = CancellationToken::new();

        run_effect(
            controller,
            EffectSpec::Pomodoro {
                work_minutes: 1,
                break_minutes: 1,
                cycles: 2,
            },
            cancel,
        )
        .await;

        let commands = commands.lock().unwrap();
        let colors = colors_of(&commands);
        // Work/alert/break phases all happened.
        assert!(colors.contains(&color::GREEN));
        assert!(colors.contains(&color::YELLOW));
        // Defined idle state at the end.
        let last_two = &commands[commands.len() - 2..];
        assert_eq!(last_two[0], Command::color(color::WHITE));
        assert_eq!(last_two[1], Command::Brightness { pct: 100 });
    }

    #[tokio::test(start_paused = true)]
    async fn pomodoro_cancellation_still_ends_in_idle_state() {
        let (controller, commands, _stats) = harness(0);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_effect(
            controller,
            EffectSpec::Pomodoro {
                work_minutes: 25,
                break_minutes: 5,
                cycles: 4,
            },
            cancel.clone(),
        ));
        tokio::time::sleep(Duration::from_secs(90)).await;
        cancel.cancel();
        task.await.unwrap();

        let commands = commands.lock().unwrap();
        let last_two = &commands[commands.len() - 2..];
        assert_eq!(last_two[0], Command::color(color::WHITE));
        assert_eq!(last_two[1], Command::Brightness { pct: 100 });
        // Celebration flourish is reserved for natural completion.
        let colors = colors_of(&commands);
        assert!(!colors.contains(&color::YELLOW));
    }

    #[tokio::test(start_paused = true)]
    async fn aurora_interpolates_toward_the_palette() {
        let (controller, commands, _stats) = harness(0);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_effect(controller, EffectSpec::Aurora, cancel.clone()));
        tokio::time::sleep(Duration::from_millis(1200)).await;
        cancel.cancel();
        task.await.unwrap();

        let commands = commands.lock().unwrap();
        let colors = colors_of(&commands);
        // The first transition starts from the snapshot default (white) and
        // must land exactly on the first aurora color.
        assert_eq!(colors[0], color::WHITE.lerp(palette::AURORA[0], 0, 10));
        assert!(colors.contains(&palette::AURORA[0]));
    }
}
