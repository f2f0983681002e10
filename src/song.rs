//! Song Sequencer
//!
//! A song is a borrowed slice of notes. [`SongPlayer`] steps through it one
//! timer tick at a time and returns the tone command to emit whenever the
//! note changes; [`SongTickHandler`] wires that to IRQ0. [`play_song`] is the
//! blocking variant for when no tick source is running.

pub mod speaker;

use spin::Mutex;

use crate::interrupts::registry::{InterruptContext, InterruptHandler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
    /// Hz, 0 = rest
    pub frequency: u32,
    pub duration_ticks: u32,
}

impl Note {
    pub const fn new(frequency: u32, duration_ticks: u32) -> Self {
        Self {
            frequency,
            duration_ticks,
        }
    }

    pub const fn rest(duration_ticks: u32) -> Self {
        Self::new(0, duration_ticks)
    }

    pub fn command(&self) -> ToneCommand {
        match self.frequency {
            0 => ToneCommand::Silence,
            frequency => ToneCommand::Play(frequency),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Song<'a> {
    notes: &'a [Note],
}

impl<'a> Song<'a> {
    pub const fn new(notes: &'a [Note]) -> Self {
        Self { notes }
    }

    pub fn notes(&self) -> &'a [Note] {
        self.notes
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn total_ticks(&self) -> u64 {
        self.notes
            .iter()
            .map(|note| u64::from(note.duration_ticks))
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneCommand {
    Play(u32),
    Silence,
}

pub trait ToneOutput {
    fn start_tone(&mut self, frequency: u32);
    fn stop_tone(&mut self);

    fn apply(&mut self, command: ToneCommand) {
        match command {
            ToneCommand::Play(frequency) => self.start_tone(frequency),
            ToneCommand::Silence => self.stop_tone(),
        }
    }
}

/// `cursor` is always a valid note index, or `notes.len()` once finished.
#[derive(Debug, Clone, Copy, Default)]
pub struct SongPlayer<'a> {
    song: Option<Song<'a>>,
    cursor: usize,
    ticks_remaining: u32,
}

impl<'a> SongPlayer<'a> {
    pub const fn new() -> Self {
        Self {
            song: None,
            cursor: 0,
            ticks_remaining: 0,
        }
    }

    /// Binds `song` and rewinds. Returns the command for the first note, or
    /// silence when there is nothing to play.
    pub fn assign(&mut self, song: Option<Song<'a>>) -> ToneCommand {
        self.song = song.filter(|song| !song.is_empty());
        self.enter(0)
    }

    /// One timer tick. `Some` only when the note changes or the song ends.
    pub fn tick(&mut self) -> Option<ToneCommand> {
        if self.is_idle() {
            return None;
        }

        self.ticks_remaining -= 1;
        if self.ticks_remaining > 0 {
            return None;
        }
        Some(self.enter(self.cursor + 1))
    }

    pub fn is_idle(&self) -> bool {
        self.cursor >= self.notes().len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn ticks_remaining(&self) -> u32 {
        self.ticks_remaining
    }

    pub fn current_note(&self) -> Option<&'a Note> {
        self.notes().get(self.cursor)
    }

    fn notes(&self) -> &'a [Note] {
        self.song.map(|song| song.notes()).unwrap_or(&[])
    }

    // 長さ0の音符は飛ばす
    fn enter(&mut self, index: usize) -> ToneCommand {
        let notes = self.notes();
        let mut index = index;
        while notes.get(index).is_some_and(|note| note.duration_ticks == 0) {
            index += 1;
        }

        self.cursor = index.min(notes.len());
        match notes.get(index) {
            Some(note) => {
                self.ticks_remaining = note.duration_ticks;
                note.command()
            }
            None => {
                self.ticks_remaining = 0;
                ToneCommand::Silence
            }
        }
    }
}

/// Plays `song` to the end before returning, calling `wait_tick` once per
/// tick. Ties up the caller for the whole song.
pub fn play_song<T: ToneOutput>(song: Song<'_>, output: &mut T, mut wait_tick: impl FnMut()) {
    let mut player = SongPlayer::new();
    output.apply(player.assign(Some(song)));

    while !player.is_idle() {
        wait_tick();
        if let Some(command) = player.tick() {
            output.apply(command);
        }
    }
}

struct Sequencer<'a, T> {
    player: SongPlayer<'a>,
    output: T,
}

/// IRQ0 handler advancing a [`SongPlayer`].
pub struct SongTickHandler<'a, T: ToneOutput + Send> {
    state: Mutex<Sequencer<'a, T>>,
}

impl<'a, T: ToneOutput + Send> SongTickHandler<'a, T> {
    pub const fn new(output: T) -> Self {
        Self {
            state: Mutex::new(Sequencer {
                player: SongPlayer::new(),
                output,
            }),
        }
    }

    /// The tick handler takes the same lock, so on hardware call this with
    /// interrupts disabled.
    pub fn assign(&self, song: Option<Song<'a>>) {
        let mut state = self.state.lock();
        let command = state.player.assign(song);
        state.output.apply(command);
    }

    pub fn is_idle(&self) -> bool {
        self.state.lock().player.is_idle()
    }
}

impl<T: ToneOutput + Send> InterruptHandler for SongTickHandler<'_, T> {
    fn handle(&self, _context: &InterruptContext) {
        let mut state = self.state.lock();
        if let Some(command) = state.player.tick() {
            state.output.apply(command);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupts::registry::{InterruptRegistry, TrapFrame, TIMER_IRQ};
    use std::vec::Vec;

    #[derive(Default)]
    struct RecordingOutput {
        commands: Vec<ToneCommand>,
    }

    impl ToneOutput for RecordingOutput {
        fn start_tone(&mut self, frequency: u32) {
            self.commands.push(ToneCommand::Play(frequency));
        }

        fn stop_tone(&mut self) {
            self.commands.push(ToneCommand::Silence);
        }
    }

    const THREE_NOTES: [Note; 3] = [Note::new(440, 4), Note::rest(2), Note::new(523, 3)];

    fn tick_n(player: &mut SongPlayer<'_>, n: usize) -> Vec<ToneCommand> {
        (0..n).filter_map(|_| player.tick()).collect()
    }

    #[test]
    fn empty_song_leaves_player_idle() {
        let mut player = SongPlayer::new();
        assert_eq!(player.assign(Some(Song::new(&[]))), ToneCommand::Silence);
        assert!(player.is_idle());
        assert_eq!(player.tick(), None);
        assert_eq!(player.cursor(), 0);
    }

    #[test]
    fn no_song_is_not_an_error() {
        let mut player = SongPlayer::new();
        assert_eq!(player.assign(None), ToneCommand::Silence);
        assert!(player.is_idle());
        assert_eq!(player.tick(), None);
    }

    #[test]
    fn fresh_player_is_idle() {
        let mut player = SongPlayer::new();
        assert!(player.is_idle());
        assert_eq!(player.tick(), None);
    }

    #[test]
    fn advances_one_note_per_duration() {
        let mut player = SongPlayer::new();
        assert_eq!(player.assign(Some(Song::new(&THREE_NOTES))), ToneCommand::Play(440));
        assert_eq!(player.ticks_remaining(), 4);

        assert!(tick_n(&mut player, 3).is_empty());
        assert_eq!(player.cursor(), 0);
        assert_eq!(player.tick(), Some(ToneCommand::Silence));
        assert_eq!(player.cursor(), 1);
        assert_eq!(player.ticks_remaining(), 2);

        assert_eq!(player.tick(), None);
        assert_eq!(player.tick(), Some(ToneCommand::Play(523)));
        assert_eq!(player.cursor(), 2);
        assert_eq!(player.current_note(), Some(&Note::new(523, 3)));

        assert_eq!(tick_n(&mut player, 2), Vec::new());
        assert!(!player.is_idle());
        assert_eq!(player.tick(), Some(ToneCommand::Silence));
        assert!(player.is_idle());
        assert_eq!(player.cursor(), THREE_NOTES.len());

        assert_eq!(player.tick(), None);
        assert_eq!(tick_n(&mut player, 10), Vec::new());
    }

    #[test]
    fn reassigning_rewinds() {
        let mut player = SongPlayer::new();
        player.assign(Some(Song::new(&THREE_NOTES)));
        tick_n(&mut player, 5);
        assert_eq!(player.cursor(), 1);

        assert_eq!(player.assign(Some(Song::new(&THREE_NOTES))), ToneCommand::Play(440));
        assert_eq!(player.cursor(), 0);
        assert_eq!(player.ticks_remaining(), 4);
    }

    #[test]
    fn zero_length_notes_are_skipped() {
        let notes = [Note::new(300, 0), Note::new(330, 1), Note::new(349, 0), Note::new(392, 2)];
        let mut player = SongPlayer::new();

        assert_eq!(player.assign(Some(Song::new(&notes))), ToneCommand::Play(330));
        assert_eq!(player.cursor(), 1);
        assert_eq!(player.tick(), Some(ToneCommand::Play(392)));
        assert_eq!(player.cursor(), 3);
        assert_eq!(tick_n(&mut player, 2), [ToneCommand::Silence]);
        assert!(player.is_idle());
    }

    #[test]
    fn song_of_only_silent_lengths_is_idle() {
        let notes = [Note::new(440, 0), Note::rest(0)];
        let mut player = SongPlayer::new();
        assert_eq!(player.assign(Some(Song::new(&notes))), ToneCommand::Silence);
        assert!(player.is_idle());
        assert_eq!(player.cursor(), notes.len());
    }

    #[test]
    fn blocking_play_waits_every_tick() {
        let mut output = RecordingOutput::default();
        let mut waited = 0u64;
        let song = Song::new(&THREE_NOTES);

        play_song(song, &mut output, || waited += 1);

        assert_eq!(waited, song.total_ticks());
        assert_eq!(
            output.commands,
            [
                ToneCommand::Play(440),
                ToneCommand::Silence,
                ToneCommand::Play(523),
                ToneCommand::Silence,
            ]
        );
    }

    #[test]
    fn tick_handler_follows_timer_irq() {
        let handler = SongTickHandler::new(RecordingOutput::default());
        let mut registry = InterruptRegistry::new();
        registry.register_irq_handler(TIMER_IRQ, &handler).unwrap();

        handler.assign(Some(Song::new(&THREE_NOTES)));
        for _ in 0..9 {
            registry.dispatch_irq(TIMER_IRQ, &TrapFrame::empty());
        }
        assert!(handler.is_idle());
        registry.dispatch_irq(TIMER_IRQ, &TrapFrame::empty());

        let state = handler.state.lock();
        assert_eq!(
            state.output.commands,
            [
                ToneCommand::Play(440),
                ToneCommand::Silence,
                ToneCommand::Play(523),
                ToneCommand::Silence,
            ]
        );
    }
}
