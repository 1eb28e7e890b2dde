//! Ball and player motion on the normalized field.
//!
//! [`PhysicsSimulator::advance`] runs one fixed step:
//!
//! 1. Move the ball, reflect it off the field bounds, and roll the goal rule
//!    when it bounced off a goal line.
//! 2. Occasionally replace the ball velocity with a random one.
//! 3. For every player: move, reflect, occasionally re-randomize, and steer
//!    toward the ball when it is within [`ATTRACTION_RADIUS`].
//!
//! The step is not wall-clock scaled: velocities are displacements per
//! frame. The individual rules are free functions over plain values so they
//! can be tested with a seeded generator.
//!
//! # Goal rule
//!
//! The goal rule is a game rule, not physics. When the ball bounces off the
//! left or right boundary there is a [`GOAL_CHANCE`] chance that the bounce
//! counts as a goal. The left side is team A's end, so a left bounce scores
//! for team B and a right bounce scores for team A.

use rand::Rng;
use rand::rngs::StdRng;
use touchline_types::{BallState, GoalEvent, PlayerState, Scoreboard, Team, Vector2};
use tracing::info;

/// Lower bound of the playable area on both axes.
pub const FIELD_MIN: f64 = 0.05;

/// Upper bound of the playable area on both axes.
pub const FIELD_MAX: f64 = 0.95;

/// Fixed step applied per frame.
pub const NOMINAL_STEP: f64 = 1.0;

/// Number of simulated players (two squads of eleven).
pub const PLAYER_COUNT: u8 = 22;

/// Players closer than this to the ball are pulled toward it.
pub const ATTRACTION_RADIUS: f64 = 0.3;

/// Fraction of the ball displacement added to a nearby player's velocity.
pub const ATTRACTION_GAIN: f64 = 0.0001;

/// Per-frame chance that the ball changes direction at random.
pub const BALL_PERTURB_CHANCE: f64 = 0.01;

/// Maximum per-axis ball speed after a random direction change.
pub const BALL_MAX_SPEED: f64 = 0.005;

/// Per-frame chance that a player changes direction at random.
pub const PLAYER_PERTURB_CHANCE: f64 = 0.02;

/// Maximum per-axis player speed after a random direction change.
pub const PLAYER_MAX_SPEED: f64 = 0.001;

/// Chance that a bounce off a goal line counts as a goal.
pub const GOAL_CHANCE: f64 = 0.1;

/// Ball velocity at kick-off.
pub const KICKOFF_VELOCITY: Vector2 = Vector2::new(0.005, 0.003);

/// Tunable rule constants. [`Default`] gives the module constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsParams {
    /// See [`BALL_PERTURB_CHANCE`].
    pub ball_perturb_chance: f64,
    /// See [`BALL_MAX_SPEED`].
    pub ball_max_speed: f64,
    /// See [`PLAYER_PERTURB_CHANCE`].
    pub player_perturb_chance: f64,
    /// See [`PLAYER_MAX_SPEED`].
    pub player_max_speed: f64,
    /// See [`ATTRACTION_RADIUS`].
    pub attraction_radius: f64,
    /// See [`ATTRACTION_GAIN`].
    pub attraction_gain: f64,
    /// See [`GOAL_CHANCE`].
    pub goal_chance: f64,
}

impl Default for PhysicsParams {
    fn default() -> Self {
        Self {
            ball_perturb_chance: BALL_PERTURB_CHANCE,
            ball_max_speed: BALL_MAX_SPEED,
            player_perturb_chance: PLAYER_PERTURB_CHANCE,
            player_max_speed: PLAYER_MAX_SPEED,
            attraction_radius: ATTRACTION_RADIUS,
            attraction_gain: ATTRACTION_GAIN,
            goal_chance: GOAL_CHANCE,
        }
    }
}

// ---------------------------------------------------------------------------
// Pure rules
// ---------------------------------------------------------------------------

/// Which bound an axis step bounced off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// [`FIELD_MIN`] (left or top).
    Min,
    /// [`FIELD_MAX`] (right or bottom).
    Max,
}

/// Result of moving one coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisStep {
    /// Coordinate after the step, inside `[FIELD_MIN, FIELD_MAX]`.
    pub position: f64,
    /// Velocity component after the step (negated on a bounce).
    pub velocity: f64,
    /// Bound that was crossed, if any.
    pub bounce: Option<Boundary>,
}

/// Move one coordinate by `velocity * dt`, reflecting elastically off the
/// field bounds.
///
/// The overshoot is mirrored back into the field and the result is clamped,
/// so the returned position is always within bounds.
pub fn reflect_axis(position: f64, velocity: f64, dt: f64) -> AxisStep {
    let next = velocity.mul_add(dt, position);
    let (mirrored, bounce) = if next < FIELD_MIN {
        (FIELD_MIN + (FIELD_MIN - next), Some(Boundary::Min))
    } else if next > FIELD_MAX {
        (FIELD_MAX - (next - FIELD_MAX), Some(Boundary::Max))
    } else {
        (next, None)
    };
    AxisStep {
        position: mirrored.clamp(FIELD_MIN, FIELD_MAX),
        velocity: if bounce.is_some() { -velocity } else { velocity },
        bounce,
    }
}

/// Move a point by `velocity * dt` with reflection on both axes.
///
/// Returns the new position, the new velocity, and the x-axis bounce (the
/// only one the goal rule cares about).
pub fn reflect(position: Vector2, velocity: Vector2, dt: f64) -> (Vector2, Vector2, Option<Boundary>) {
    let x = reflect_axis(position.x, velocity.x, dt);
    let y = reflect_axis(position.y, velocity.y, dt);
    (
        Vector2::new(x.position, y.position),
        Vector2::new(x.velocity, y.velocity),
        x.bounce,
    )
}

/// With probability `chance`, replace `velocity` with a uniformly random
/// vector whose components lie in `[-max_speed, max_speed)`.
pub fn perturb<R: Rng + ?Sized>(velocity: Vector2, rng: &mut R, chance: f64, max_speed: f64) -> Vector2 {
    if rng.random::<f64>() < chance {
        random_velocity(rng, max_speed)
    } else {
        velocity
    }
}

/// A uniformly random velocity with components in `[-max_speed, max_speed)`.
pub fn random_velocity<R: Rng + ?Sized>(rng: &mut R, max_speed: f64) -> Vector2 {
    let x = (rng.random::<f64>() - 0.5) * 2.0 * max_speed;
    let y = (rng.random::<f64>() - 0.5) * 2.0 * max_speed;
    Vector2::new(x, y)
}

/// Steer a player toward the ball when it is closer than `radius`.
///
/// The nudge is proportional to the displacement, so players converge on
/// the ball gradually without ever being snapped onto it.
pub fn attract(position: Vector2, velocity: Vector2, ball: Vector2, radius: f64, gain: f64) -> Vector2 {
    let toward = ball - position;
    if toward.length() < radius {
        velocity + toward * gain
    } else {
        velocity
    }
}

/// Team credited when the ball bounces off the given x boundary.
pub const fn scoring_team(boundary: Boundary) -> Team {
    match boundary {
        Boundary::Min => Team::B,
        Boundary::Max => Team::A,
    }
}

/// Create the 22 kick-off players.
///
/// Team A spawns with x in `[0.3, 0.5)`, team B with x in `[0.5, 0.7)`;
/// both with y in `[0.1, 0.9)` and a small random velocity.
pub fn spawn_players<R: Rng + ?Sized>(rng: &mut R) -> Vec<PlayerState> {
    (0..PLAYER_COUNT)
        .map(|id| {
            let team = Team::for_player(id);
            let base_x = match team {
                Team::A => 0.3,
                Team::B => 0.5,
            };
            let x = rng.random::<f64>().mul_add(0.2, base_x);
            let y = rng.random::<f64>().mul_add(0.8, 0.1);
            PlayerState {
                id,
                team,
                position: Vector2::new(x, y),
                velocity: random_velocity(rng, PLAYER_MAX_SPEED),
                detected: false,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// Result of one physics step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    /// Frame number that just ran (1-based).
    pub frame: u64,
    /// Goal scored on this frame, if any.
    pub goal: Option<GoalEvent>,
}

/// Owner of the ball, the players, and the score.
#[derive(Debug, Clone)]
pub struct PhysicsSimulator {
    ball: BallState,
    players: Vec<PlayerState>,
    score: Scoreboard,
    frame: u64,
    params: PhysicsParams,
    rng: StdRng,
}

impl PhysicsSimulator {
    /// Kick-off state: ball on the center spot, players in their halves.
    pub fn new(params: PhysicsParams, mut rng: StdRng) -> Self {
        let players = spawn_players(&mut rng);
        Self {
            ball: BallState {
                position: Vector2::CENTER,
                velocity: KICKOFF_VELOCITY,
            },
            players,
            score: Scoreboard::default(),
            frame: 0,
            params,
            rng,
        }
    }

    /// Start from an explicit ball and player layout.
    pub fn from_state(
        ball: BallState,
        players: Vec<PlayerState>,
        params: PhysicsParams,
        rng: StdRng,
    ) -> Self {
        Self {
            ball,
            players,
            score: Scoreboard::default(),
            frame: 0,
            params,
            rng,
        }
    }

    /// Advance everything by one step of length `dt`.
    pub fn advance(&mut self, dt: f64) -> StepOutcome {
        self.frame = self.frame.saturating_add(1);
        let params = self.params;

        let (position, velocity, bounce) = reflect(self.ball.position, self.ball.velocity, dt);
        let goal = bounce
            .filter(|_| self.rng.random::<f64>() < params.goal_chance)
            .map(|boundary| self.record_goal(scoring_team(boundary)));
        self.ball = BallState {
            position,
            velocity: perturb(
                velocity,
                &mut self.rng,
                params.ball_perturb_chance,
                params.ball_max_speed,
            ),
        };

        let ball_position = self.ball.position;
        for player in &mut self.players {
            let (position, velocity, _) = reflect(player.position, player.velocity, dt);
            let velocity = perturb(
                velocity,
                &mut self.rng,
                params.player_perturb_chance,
                params.player_max_speed,
            );
            player.position = position;
            player.velocity = attract(
                position,
                velocity,
                ball_position,
                params.attraction_radius,
                params.attraction_gain,
            );
        }

        StepOutcome {
            frame: self.frame,
            goal,
        }
    }

    fn record_goal(&mut self, team: Team) -> GoalEvent {
        self.score.record(team);
        info!(
            frame = self.frame,
            scoring_team = ?team,
            team_a = self.score.team_a,
            team_b = self.score.team_b,
            "Goal scored"
        );
        GoalEvent {
            scoring_team: team,
            score: self.score,
            frame: self.frame,
        }
    }

    /// Apply the tracker's per-player detection flags (ordered by id).
    pub fn mark_detected(&mut self, flags: &[bool]) {
        for (player, &detected) in self.players.iter_mut().zip(flags) {
            player.detected = detected;
        }
    }

    /// Current ball state.
    pub const fn ball(&self) -> BallState {
        self.ball
    }

    /// Current player states, ordered by id.
    pub fn players(&self) -> &[PlayerState] {
        &self.players
    }

    /// Current score.
    pub const fn score(&self) -> Scoreboard {
        self.score
    }

    /// Number of steps run so far.
    pub const fn frame(&self) -> u64 {
        self.frame
    }
}
