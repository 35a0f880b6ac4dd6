use std::collections::VecDeque;

use rand::SeedableRng as _;
use rand_pcg::Pcg32;

use crate::{
    core::{Agent, AgentHandle, ObstaclePair},
    engine::{gap_policy, spawn_seed::SpawnSeed, world_config::WorldConfig},
};

/// What happened during one [`Simulator::step`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepOutcome {
    /// Agents that died this tick
    pub died: usize,
    /// Obstacle pairs newly counted toward the shared score this tick
    pub scored: u32,
}

/// Deterministic tick-based world shared by all agents of a generation.
///
/// The simulator owns the agents, the obstacle pairs (oldest first), the shared
/// score, and the spawn timer. Only [`Simulator::step`] changes the world;
/// callers observe it through read-only accessors and influence it only by
/// spawning agents and requesting jumps.
///
/// Given the same [`SpawnSeed`] and the same sequence of jump requests, two
/// simulators produce identical worlds tick for tick.
#[derive(Debug, Clone)]
pub struct Simulator {
    config: WorldConfig,
    seed: SpawnSeed,
    rng: Pcg32,
    agents: Vec<Agent>,
    obstacles: VecDeque<ObstaclePair>,
    score: u32,
    spawn_timer: u32,
    tick: u64,
    next_obstacle_id: u64,
}

impl Simulator {
    #[must_use]
    pub fn new(config: WorldConfig, seed: SpawnSeed) -> Self {
        Self {
            config,
            seed,
            rng: Pcg32::from_seed(seed.bytes()),
            agents: Vec::new(),
            obstacles: VecDeque::new(),
            score: 0,
            spawn_timer: config.spawn_interval_ticks,
            tick: 0,
            next_obstacle_id: 0,
        }
    }

    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    #[must_use]
    pub fn seed(&self) -> SpawnSeed {
        self.seed
    }

    /// Clears all agents, obstacles, the score, and the spawn timer.
    ///
    /// The gap generator restarts from the current seed, so a reset simulator
    /// replays the same obstacle course. The timer is armed so the first
    /// [`step`](Self::step) may spawn a pair right away.
    pub fn reset(&mut self) {
        self.rng = Pcg32::from_seed(self.seed.bytes());
        self.agents.clear();
        self.obstacles.clear();
        self.score = 0;
        self.spawn_timer = self.config.spawn_interval_ticks;
        self.tick = 0;
        self.next_obstacle_id = 0;
    }

    /// Like [`reset`](Self::reset), but switches to a different obstacle course.
    pub fn reseed(&mut self, seed: SpawnSeed) {
        self.seed = seed;
        self.reset();
    }

    /// Adds a live agent with zero velocity at `(x, y)`.
    pub fn spawn_agent(&mut self, x: f32, y: f32) -> AgentHandle {
        let handle = AgentHandle(self.agents.len());
        self.agents.push(Agent::new(
            x,
            y,
            self.config.agent_width,
            self.config.agent_height,
        ));
        handle
    }

    /// Requests a jump for the agent, applied during the next [`step`](Self::step).
    ///
    /// Dead agents and unknown handles are ignored.
    pub fn jump(&mut self, handle: AgentHandle) {
        if let Some(agent) = self.agents.get_mut(handle.0)
            && agent.is_alive()
        {
            agent.request_jump();
        }
    }

    #[must_use]
    pub fn agent(&self, handle: AgentHandle) -> Option<&Agent> {
        self.agents.get(handle.0)
    }

    /// All agents spawned since the last reset, dead ones included.
    #[must_use]
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn live_agents(&self) -> impl Iterator<Item = (AgentHandle, &Agent)> + '_ {
        self.agents
            .iter()
            .enumerate()
            .filter(|(_, agent)| agent.is_alive())
            .map(|(i, agent)| (AgentHandle(i), agent))
    }

    #[must_use]
    pub fn live_agent_count(&self) -> usize {
        self.agents.iter().filter(|agent| agent.is_alive()).count()
    }

    /// Obstacle pairs in spawn order, oldest first.
    pub fn obstacles(&self) -> impl ExactSizeIterator<Item = &ObstaclePair> + Clone + '_ {
        self.obstacles.iter()
    }

    /// Obstacle pairs cleared so far by any agent.
    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    /// Ticks advanced since the last reset.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Advances the world by one tick.
    pub fn step(&mut self) -> StepOutcome {
        let mut outcome = StepOutcome::default();
        let WorldConfig {
            gravity,
            jump_impulse,
            max_fall_speed,
            obstacle_speed,
            height,
            ..
        } = self.config;

        for agent in self.agents.iter_mut().filter(|a| a.is_alive()) {
            agent.apply_physics(gravity, jump_impulse, max_fall_speed);
        }

        self.advance_spawn_timer();

        for pair in &mut self.obstacles {
            pair.advance(obstacle_speed);
        }
        self.obstacles.retain(|pair| pair.right() >= 0.0);

        for agent in self.agents.iter_mut().filter(|a| a.is_alive()) {
            let rect = agent.rect();
            let out_of_bounds = rect.top() <= 0.0 || rect.bottom() >= height;
            if out_of_bounds || self.obstacles.iter().any(|pair| pair.collides_with(&rect)) {
                agent.kill();
                outcome.died += 1;
            }
        }

        for agent in self.agents.iter().filter(|a| a.is_alive()) {
            for pair in &mut self.obstacles {
                // passed during this tick: trailing edge crossed the agent's leading edge
                if !pair.is_scored()
                    && pair.right() < agent.x()
                    && pair.right() >= agent.x() - obstacle_speed
                {
                    pair.mark_scored();
                    outcome.scored += 1;
                }
            }
        }
        self.score += outcome.scored;

        self.tick += 1;
        outcome
    }

    fn advance_spawn_timer(&mut self) {
        self.spawn_timer = self.spawn_timer.saturating_add(1);
        if self.spawn_timer < self.config.spawn_interval_ticks {
            return;
        }
        let in_flight = self
            .obstacles
            .iter()
            .any(|pair| pair.right() > self.config.width);
        if in_flight {
            return;
        }

        let gap_center = gap_policy::sample_gap_center(&mut self.rng, &self.config);
        self.push_obstacle(self.config.spawn_x(), gap_center);
        self.spawn_timer = 0;
    }

    fn push_obstacle(&mut self, x: f32, gap_center: f32) {
        let pair = ObstaclePair::new(
            self.next_obstacle_id,
            x,
            self.config.obstacle_width,
            gap_center,
            self.config.gap_height,
            self.config.height,
        );
        log::trace!(
            "tick {}: spawned obstacle #{} at x={x} gap_center={gap_center:.1}",
            self.tick,
            pair.id()
        );
        self.next_obstacle_id += 1;
        self.obstacles.push_back(pair);
    }
}
