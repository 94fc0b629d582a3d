//! Human-like browser interactions
//!
//! Mouse paths, key cadence and idle pauses that look like a person at the
//! keyboard rather than a script.

use std::cell::RefCell;
use std::ops::RangeInclusive;
use std::time::Duration;

use rand::Rng;
use smallvec::SmallVec;
use tokio::time::sleep;

use crate::cdp::{MouseEventType, Session};
use crate::error::Result;

thread_local! {
    static RNG: RefCell<rand::rngs::ThreadRng> = RefCell::new(rand::thread_rng());
}

fn random_ms(min: u64, max: u64) -> u64 {
    RNG.with(|rng| rng.borrow_mut().gen_range(min..max))
}

fn random_f64(min: f64, max: f64) -> f64 {
    RNG.with(|rng| rng.borrow_mut().gen_range(min..max))
}

fn random_bool(probability: f64) -> bool {
    RNG.with(|rng| rng.borrow_mut().gen_bool(probability))
}

type Point = (f64, f64);

/// Stack-allocated storage for typical mouse paths
type PointVec = SmallVec<[Point; 64]>;

/// Cubic Bezier path from `start` to `end` with randomized control points
fn bezier_curve(start: Point, end: Point, num_points: usize) -> PointVec {
    let num_points = num_points.max(2);

    let cp1 = (
        start.0 + (end.0 - start.0) * random_f64(0.2, 0.4) + random_f64(-50.0, 50.0),
        start.1 + (end.1 - start.1) * random_f64(0.0, 0.3) + random_f64(-50.0, 50.0),
    );
    let cp2 = (
        start.0 + (end.0 - start.0) * random_f64(0.6, 0.8) + random_f64(-50.0, 50.0),
        start.1 + (end.1 - start.1) * random_f64(0.7, 1.0) + random_f64(-50.0, 50.0),
    );

    (0..num_points)
        .map(|i| {
            let t = i as f64 / (num_points - 1) as f64;
            let mt = 1.0 - t;
            let x = mt.powi(3) * start.0
                + 3.0 * mt.powi(2) * t * cp1.0
                + 3.0 * mt * t.powi(2) * cp2.0
                + t.powi(3) * end.0;
            let y = mt.powi(3) * start.1
                + 3.0 * mt.powi(2) * t * cp1.1
                + 3.0 * mt * t.powi(2) * cp2.1
                + t.powi(3) * end.1;
            (x, y)
        })
        .collect()
}

/// Sleep for a uniformly random duration in `secs` (seconds)
pub async fn pause(secs: RangeInclusive<f64>) {
    let (lo, hi) = (*secs.start(), *secs.end());
    let chosen = if hi > lo {
        RNG.with(|rng| rng.borrow_mut().gen_range(lo..=hi))
    } else {
        lo
    };
    sleep(Duration::from_secs_f64(chosen.max(0.0))).await;
}

/// Human-like interaction helpers bound to one page session
pub struct Human<'a> {
    session: &'a Session,
}

impl<'a> Human<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Move the mouse along a curved path to the target and click it
    pub async fn move_and_click(&self, target_x: f64, target_y: f64) -> Result<()> {
        let start = (random_f64(100.0, 800.0), random_f64(100.0, 600.0));
        let distance = ((target_x - start.0).powi(2) + (target_y - start.1).powi(2)).sqrt();
        let num_points = (distance / 10.0).clamp(10.0, 50.0) as usize;

        for (x, y) in bezier_curve(start, (target_x, target_y), num_points) {
            self.session.mouse(MouseEventType::MouseMoved, x, y).await?;
            sleep(Duration::from_millis(random_ms(5, 25))).await;
        }

        sleep(Duration::from_millis(random_ms(50, 150))).await;

        let x = target_x + random_f64(-2.0, 2.0);
        let y = target_y + random_f64(-2.0, 2.0);
        self.session.mouse(MouseEventType::MousePressed, x, y).await?;
        sleep(Duration::from_millis(random_ms(50, 120))).await;
        self.session.mouse(MouseEventType::MouseReleased, x, y).await?;

        sleep(Duration::from_millis(random_ms(30, 100))).await;
        Ok(())
    }

    /// Type text one key at a time with a natural, uneven cadence
    pub async fn type_text(&self, text: &str) -> Result<()> {
        for ch in text.chars() {
            self.session.key_char(ch).await?;

            let base = if ch == ' ' {
                random_ms(80, 180)
            } else if ch.is_ascii_punctuation() {
                random_ms(100, 200)
            } else {
                random_ms(50, 150)
            };
            // Occasional thinking pause
            let delay = if random_bool(0.05) {
                base + random_ms(200, 500)
            } else {
                base
            };
            sleep(Duration::from_millis(delay)).await;
        }
        Ok(())
    }
}
