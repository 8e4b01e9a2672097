//! One round of cell contention: intent, arbitrate, confirm, commit.
//!
//! # Claims and links
//!
//! A mover (a solitary agent, or a pair acting as one) registers one [`Leg`]
//! per agent that actually changes cell. Each leg becomes a [`Claim`] and an
//! intent on the target cell.
//!
//! Arbitration picks one winner per cell. When the target's resident is
//! itself moving, the winner gets `head = resident` and the resident gets
//! `tail = winner`: the winner can only move once its head has left. Every
//! claim has one target and every resident one cell, so links form simple
//! chains or rings, never trees.
//!
//! # Confirmation
//!
//! Walking head links from a winner ([`Round::bubble_up`]) ends either at a
//! chain front (no head) or back at the start (a ring). A ring is broken by
//! cutting the head link of its first-visited member, the ring origin. That
//! origin becomes a front whose target is vacated by the ring itself.
//!
//! A front confirms when its target is empty, or when it is a ring origin
//! and its target still holds the member it was cut from. Confirmation then
//! flows backward along tails.
//!
//! Movers are rigid: a mover with only some legs confirmed loses all of
//! them. Un-confirmation flows along tails and from a ring's cut member back
//! to its origin, repeated until nothing changes.
//!
//! # Commit
//!
//! Fronts commit in id order. A plain front moves, then its tails step into
//! the freed cells. A ring origin lifts out first, its tails rotate the ring,
//! and it lands last. [`Board::occupy`] refuses occupied cells, so an
//! inconsistent round surfaces as [`Error::CellOccupied`].

use std::collections::{BTreeMap, BTreeSet};

use evac_topology::GridCoord;

use crate::{AgentId, Board, Error, RandomSource, Result};

/// One agent's requested cell change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Leg {
    pub agent: AgentId,
    pub from: GridCoord,
    pub to: GridCoord,
}

impl Leg {
    pub const fn new(agent: AgentId, from: GridCoord, to: GridCoord) -> Self {
        Self { agent, from, to }
    }

    /// True when the agent stays where it is.
    pub fn is_stay(&self) -> bool {
        self.from == self.to
    }
}

/// Tick-scoped state of one registered leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    /// Mover this leg belongs to
    pub mover: AgentId,
    pub from: GridCoord,
    /// Claimed next cell
    pub to: GridCoord,
    /// Won the contest for `to`
    pub won: bool,
    /// Cleared to move this round
    pub confirmed: bool,
    /// Agent currently on `to` that must leave first
    pub head: Option<AgentId>,
    /// Agent that won `from` and waits for this one to leave
    pub tail: Option<AgentId>,
    /// Head link cut to break a ring, set only on the ring origin
    pub severed_head: Option<AgentId>,
}

impl Claim {
    fn new(mover: AgentId, leg: &Leg) -> Self {
        Self {
            mover,
            from: leg.from,
            to: leg.to,
            won: false,
            confirmed: false,
            head: None,
            tail: None,
            severed_head: None,
        }
    }

    /// True for the origin of a broken ring.
    pub fn is_ring_origin(&self) -> bool {
        self.severed_head.is_some()
    }
}

/// Outcome of arbitration on one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Contest {
    pub cell: GridCoord,
    pub winner: AgentId,
    /// Agents that asked for the cell and lost; they retry next tick
    pub losers: Vec<AgentId>,
}

/// A ring of claims and the link cut to open it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RingBreak {
    pub origin: AgentId,
    /// Former head of the origin
    pub severed: AgentId,
    /// Ring members in head order, starting at the origin
    pub members: Vec<AgentId>,
}

/// A move applied to the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Committed {
    pub agent: AgentId,
    pub from: GridCoord,
    pub to: GridCoord,
}

/// Where a walk along head links ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chain {
    /// The chain's front: a claim without a head
    Front(AgentId),
    /// The walk came back to its start; members in head order
    Ring(Vec<AgentId>),
}

/// Everything a full round produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub contests: Vec<Contest>,
    pub ring_breaks: Vec<RingBreak>,
    pub moves: Vec<Committed>,
}

/// Claims of the current tick.
#[derive(Debug, Clone, Default)]
pub struct Round {
    claims: BTreeMap<AgentId, Claim>,
    movers: BTreeMap<AgentId, Vec<AgentId>>,
    /// cut member -> ring origin waiting for it
    waiting_origins: BTreeMap<AgentId, AgentId>,
}

impl Round {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the legs of one mover.
    ///
    /// Staying legs are skipped. The whole call is validated before anything
    /// is recorded, so a rejected mover leaves no trace. Returns the number of
    /// legs registered.
    pub fn register(&mut self, board: &mut Board, mover: AgentId, legs: &[Leg]) -> Result<usize> {
        let moving: Vec<Leg> = legs.iter().copied().filter(|l| !l.is_stay()).collect();

        for (i, leg) in moving.iter().enumerate() {
            if self.claims.contains_key(&leg.agent)
                || moving[..i].iter().any(|l| l.agent == leg.agent)
            {
                return Err(Error::DuplicateClaim(leg.agent));
            }
            if !board.in_bounds(leg.to) {
                return Err(Error::OutOfBounds(leg.to));
            }
            if board.resident(leg.from) != Some(leg.agent) {
                return Err(Error::NotResident {
                    agent: leg.agent,
                    from: leg.from,
                });
            }
        }

        for leg in &moving {
            board.push_intent(leg.to, leg.agent)?;
            self.claims.insert(leg.agent, Claim::new(mover, leg));
            self.movers.entry(mover).or_default().push(leg.agent);
        }
        Ok(moving.len())
    }

    /// Pick one winner per active cell and link winners to moving residents.
    pub fn arbitrate<R>(&mut self, board: &mut Board, rng: &mut R) -> Result<Vec<Contest>>
    where
        R: RandomSource + ?Sized,
    {
        let cells: Vec<GridCoord> = board.active_cells().collect();
        let mut contests = Vec::with_capacity(cells.len());

        for cell in cells {
            let intents = board.cell(cell).map(|c| c.intents.clone()).unwrap_or_default();
            let Some(pick) = rng.choose_index(intents.len()) else {
                continue;
            };
            let winner = intents[pick];
            board.set_winner(cell, winner)?;
            self.claim_mut(winner)?.won = true;

            if let Some(resident) = board.resident(cell) {
                if resident != winner && self.claims.contains_key(&resident) {
                    self.claim_mut(winner)?.head = Some(resident);
                    self.claim_mut(resident)?.tail = Some(winner);
                }
            }

            let losers = intents
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != pick)
                .map(|(_, &a)| a)
                .collect();
            contests.push(Contest {
                cell,
                winner,
                losers,
            });
        }
        Ok(contests)
    }

    /// Follow head links from `start` until a front or back to `start`.
    pub fn bubble_up(&self, start: AgentId) -> Result<Chain> {
        let mut path = vec![start];
        let mut current = self.claim(start)?;
        for _ in 0..=self.claims.len() {
            match current.head {
                None => break,
                Some(head) if head == start => return Ok(Chain::Ring(path)),
                Some(head) => {
                    path.push(head);
                    current = self.claim(head)?;
                }
            }
        }
        Ok(Chain::Front(path[path.len() - 1]))
    }

    /// Break rings, confirm clear chains, then enforce mover rigidity.
    pub fn confirm(&mut self, board: &Board) -> Result<Vec<RingBreak>> {
        let winners: Vec<AgentId> = self
            .claims
            .iter()
            .filter(|(_, c)| c.won)
            .map(|(&id, _)| id)
            .collect();

        let mut settled = BTreeSet::new();
        let mut breaks = Vec::new();
        for id in winners {
            if settled.contains(&id) {
                continue;
            }
            match self.bubble_up(id)? {
                Chain::Front(_) => {
                    settled.insert(id);
                }
                Chain::Ring(members) => {
                    settled.extend(members.iter().copied());
                    let severed = self.sever_head(id)?;
                    breaks.push(RingBreak {
                        origin: id,
                        severed,
                        members,
                    });
                }
            }
        }

        for front in self.fronts(false) {
            let claim = self.claim(front)?;
            let clear = match board.resident(claim.to) {
                None => true,
                Some(resident) => claim.severed_head == Some(resident),
            };
            if clear {
                self.confirm_chain(front);
            }
        }

        self.enforce_rigidity();
        Ok(breaks)
    }

    /// Apply every confirmed move to the board and close the round.
    pub fn commit(self, board: &mut Board) -> Result<Vec<Committed>> {
        let result = self.apply(board);
        board.end_round();
        result
    }

    /// Run all four phases on already registered claims.
    pub fn resolve<R>(mut self, board: &mut Board, rng: &mut R) -> Result<Resolution>
    where
        R: RandomSource + ?Sized,
    {
        let contests = self.arbitrate(board, rng)?;
        let ring_breaks = self.confirm(board)?;
        let moves = self.commit(board)?;
        Ok(Resolution {
            contests,
            ring_breaks,
            moves,
        })
    }

    pub fn claim(&self, agent: AgentId) -> Result<&Claim> {
        self.claims.get(&agent).ok_or(Error::UnknownClaim(agent))
    }

    fn claim_mut(&mut self, agent: AgentId) -> Result<&mut Claim> {
        self.claims.get_mut(&agent).ok_or(Error::UnknownClaim(agent))
    }

    /// All claims in id order.
    pub fn claims(&self) -> impl Iterator<Item = (AgentId, &Claim)> + '_ {
        self.claims.iter().map(|(&id, c)| (id, c))
    }

    /// Claimed next cell of `agent`, if it claimed one.
    pub fn next_cell(&self, agent: AgentId) -> Option<GridCoord> {
        self.claims.get(&agent).map(|c| c.to)
    }

    pub fn is_confirmed(&self, agent: AgentId) -> bool {
        self.claims.get(&agent).is_some_and(|c| c.confirmed)
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Legs registered by `mover`.
    pub fn legs_of(&self, mover: AgentId) -> &[AgentId] {
        self.movers.get(&mover).map(Vec::as_slice).unwrap_or(&[])
    }

    fn sever_head(&mut self, origin: AgentId) -> Result<AgentId> {
        let claim = self.claim_mut(origin)?;
        let severed = claim.head.take().ok_or(Error::UnknownClaim(origin))?;
        claim.severed_head = Some(severed);
        self.claim_mut(severed)?.tail = None;
        self.waiting_origins.insert(severed, origin);
        Ok(severed)
    }

    /// Winners without a head, in id order.
    fn fronts(&self, confirmed_only: bool) -> Vec<AgentId> {
        self.claims
            .iter()
            .filter(|(_, c)| c.won && c.head.is_none() && (c.confirmed || !confirmed_only))
            .map(|(&id, _)| id)
            .collect()
    }

    fn confirm_chain(&mut self, front: AgentId) {
        let mut next = Some(front);
        while let Some(id) = next {
            match self.claims.get_mut(&id) {
                Some(claim) if !claim.confirmed => {
                    claim.confirmed = true;
                    next = claim.tail;
                }
                _ => break,
            }
        }
    }

    fn unconfirm(&mut self, start: AgentId) {
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            let Some(claim) = self.claims.get_mut(&id) else {
                continue;
            };
            if !claim.confirmed {
                continue;
            }
            claim.confirmed = false;
            stack.extend(claim.tail);
            stack.extend(self.waiting_origins.get(&id).copied());
        }
    }

    fn enforce_rigidity(&mut self) {
        loop {
            let broken: Vec<AgentId> = self
                .movers
                .values()
                .filter(|legs| {
                    let confirmed = legs.iter().filter(|&&a| self.is_confirmed(a)).count();
                    confirmed > 0 && confirmed < legs.len()
                })
                .flat_map(|legs| legs.iter().copied())
                .collect();
            if broken.is_empty() {
                break;
            }
            for agent in broken {
                self.unconfirm(agent);
            }
        }
    }

    fn apply(&self, board: &mut Board) -> Result<Vec<Committed>> {
        let mut moves = Vec::new();
        for front in self.fronts(true) {
            let claim = self.claim(front)?;
            let own = Committed {
                agent: front,
                from: claim.from,
                to: claim.to,
            };
            if claim.is_ring_origin() {
                if board.resident(claim.from) != Some(front) {
                    return Err(Error::NotResident {
                        agent: front,
                        from: claim.from,
                    });
                }
                board.vacate(claim.from)?;
                self.follow_tails(board, claim.tail, &mut moves)?;
                board.occupy(claim.to, front)?;
                moves.push(own);
            } else {
                board.relocate(front, claim.from, claim.to)?;
                moves.push(own);
                self.follow_tails(board, claim.tail, &mut moves)?;
            }
        }
        Ok(moves)
    }

    fn follow_tails(
        &self,
        board: &mut Board,
        first: Option<AgentId>,
        moves: &mut Vec<Committed>,
    ) -> Result<()> {
        let mut next = first;
        while let Some(id) = next {
            let claim = self.claim(id)?;
            if !claim.confirmed {
                break;
            }
            board.relocate(id, claim.from, claim.to)?;
            moves.push(Committed {
                agent: id,
                from: claim.from,
                to: claim.to,
            });
            next = claim.tail;
        }
        Ok(())
    }
}
