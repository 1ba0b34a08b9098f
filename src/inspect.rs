//! Plain-text views of simulation state for the `inspect` command

use std::fmt::Write;

use crate::agent::Agent;
use crate::core::clock::SimClock;
use crate::core::types::TileCoord;
use crate::maze::grid::Maze;
use crate::memory::node::MemoryKind;

/// "Day 1, 08:30 / steps: 180"
pub fn time_line(clock: &SimClock) -> String {
    format!("{} / steps: {}", clock.time_label(), clock.current_step())
}

/// Current action followed by the remaining schedule
pub fn schedule_summary(agent: &Agent, clock: &SimClock) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} at {}", agent.name(), agent.tile());
    match &agent.scratch.current_action {
        Some(action) => {
            let ends = action.start_step + action.duration_steps;
            let _ = writeln!(
                out,
                "now: {} {} (until step {})",
                action.emoji, action.description, ends
            );
        }
        None => {
            let _ = writeln!(out, "now: idle");
        }
    }
    if let Some(chat) = &agent.scratch.chat_state {
        let _ = writeln!(out, "chatting with {} ({} lines)", chat.partner_name, chat.transcript.len());
    }

    let mut minute = clock.minute_of_day();
    for item in &agent.scratch.daily_schedule {
        let place = item.address.as_ref().map(|a| format!(" @ {}", a)).unwrap_or_default();
        let _ = writeln!(
            out,
            "  {:02}:{:02} {} ({} min){}",
            (minute / 60) % 24,
            minute % 60,
            item.activity,
            item.duration_minutes,
            place
        );
        minute += u64::from(item.duration_minutes);
    }
    out
}

/// Memory log, newest first, optionally restricted to one kind
pub fn memory_log(agent: &Agent, kind: Option<MemoryKind>) -> String {
    let mut out = String::new();
    for node in agent.memory.nodes().iter().rev() {
        if kind.is_some_and(|k| k != node.kind) {
            continue;
        }
        let _ = writeln!(
            out,
            "{:>5} [{:?}] step {} poignancy {:.1}: {}",
            node.id.0, node.kind, node.created_at, node.poignancy, node.description
        );
        for line in &node.transcript {
            let _ = writeln!(out, "        {}: {}", line.speaker, line.text);
        }
        if !node.filling.is_empty() {
            let ids: Vec<String> = node.filling.iter().map(|id| id.0.to_string()).collect();
            let _ = writeln!(out, "        evidence: {}", ids.join(", "));
        }
    }
    out
}

pub fn spatial_tree(agent: &Agent) -> String {
    if agent.spatial.is_empty() {
        return format!("{} knows no places yet\n", agent.name());
    }
    agent.spatial.render()
}

/// Address, collision flag and events of one tile
pub fn tile_details(maze: &Maze, coord: TileCoord) -> String {
    let Some(tile) = maze.tile(coord) else {
        return format!("{} is outside the maze\n", coord);
    };
    let mut out = String::new();
    let _ = writeln!(out, "{} {}{}", coord, tile.address, if tile.collision { " (blocked)" } else { "" });
    for event in tile.events.values() {
        let _ = writeln!(out, "  {}", event.description);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::AgentId;
    use crate::maze::tile::TileEvent;
    use crate::memory::node::NewMemory;
    use crate::memory::scratch::ScheduleItem;

    #[test]
    fn test_time_line() {
        let clock = SimClock::at_step(60, 8 * 60, 30);
        assert_eq!(time_line(&clock), "Day 1, 08:30 / steps: 30");
    }

    #[test]
    fn test_schedule_lists_items_with_start_times() {
        let clock = SimClock::new(60, 9 * 60);
        let mut agent = Agent::new(AgentId(1), "Isabella", TileCoord::new(0, 0), 2);
        agent.scratch.daily_schedule.push_back(ScheduleItem {
            activity: "opening the cafe".into(),
            duration_minutes: 30,
            address: None,
        });
        agent.scratch.daily_schedule.push_back(ScheduleItem {
            activity: "serving breakfast".into(),
            duration_minutes: 90,
            address: Some("town:cafe:counter".parse().unwrap()),
        });

        let summary = schedule_summary(&agent, &clock);
        assert!(summary.contains("09:00 opening the cafe (30 min)"));
        assert!(summary.contains("09:30 serving breakfast (90 min) @ town:cafe:counter"));
    }

    #[test]
    fn test_memory_log_filters_kind() {
        let mut agent = Agent::new(AgentId(1), "Isabella", TileCoord::new(0, 0), 2);
        agent
            .record(
                NewMemory::event("Klaus", "is", "reading", "Klaus is reading").with_embedding(vec![0.0, 0.0]),
                0,
            )
            .unwrap();
        assert!(memory_log(&agent, Some(MemoryKind::Event)).contains("Klaus is reading"));
        assert!(memory_log(&agent, Some(MemoryKind::Chat)).is_empty());
    }

    #[test]
    fn test_tile_details_lists_events() {
        let mut maze = Maze::open("town", 2, 2);
        maze.add_event(TileCoord::new(1, 1), TileEvent::new("Klaus", "is", "reading", "Klaus is reading"));
        let details = tile_details(&maze, TileCoord::new(1, 1));
        assert!(details.contains("town"));
        assert!(details.contains("Klaus is reading"));
        assert!(tile_details(&maze, TileCoord::new(5, 5)).contains("outside"));
    }
}
