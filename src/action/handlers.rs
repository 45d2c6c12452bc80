use std::sync::Arc;

use super::{Action, ActionTable, Context, ControllerClass, ParamKind};
use crate::events::Event;
use crate::instrument::{Instrument, MAX_FX};
use crate::params::Param;
use crate::{Error, Result};

/// Tempo change per controller step for the fine tempo control.
const FINE_TEMPO_STEP: f64 = 0.01;

pub(super) fn register(table: &mut ActionTable) {
    use ParamKind::{Absolute, Relative, Trigger};

    // transport
    table.register("PLAY", Trigger, |ctx, _, _| ctx.editor.play());
    table.register("PLAY/STOP_TOGGLE", Trigger, |ctx, _, _| {
        if ctx.editor.session().is_playing() {
            ctx.editor.stop()
        } else {
            ctx.editor.play()
        }
    });
    table.register("PLAY/PAUSE_TOGGLE", Trigger, |ctx, _, _| {
        if ctx.editor.session().is_playing() {
            ctx.editor.pause()
        } else {
            ctx.editor.play()
        }
    });
    table.register("STOP", Trigger, |ctx, _, _| ctx.editor.stop());
    table.register("PAUSE", Trigger, |ctx, _, _| ctx.editor.pause());

    // recording
    table.register("RECORD_READY", Trigger, |ctx, _, _| {
        let session = ctx.editor.session();
        if !session.is_playing() {
            set_record_ready(ctx, !session.is_record_ready());
        }
        Ok(())
    });
    table.register("RECORD/STROBE_TOGGLE", Trigger, |ctx, _, _| {
        set_record_ready(ctx, !ctx.editor.session().is_record_ready());
        Ok(())
    });
    table.register("RECORD_STROBE", Trigger, |ctx, _, _| {
        set_record_ready(ctx, true);
        Ok(())
    });
    table.register("RECORD_EXIT", Trigger, |ctx, _, _| {
        set_record_ready(ctx, false);
        Ok(())
    });

    // mute and solo
    table.register("MUTE", Trigger, |ctx, _, _| {
        set_master_muted(ctx, true);
        Ok(())
    });
    table.register("UNMUTE", Trigger, |ctx, _, _| {
        set_master_muted(ctx, false);
        Ok(())
    });
    table.register("MUTE_TOGGLE", Trigger, |ctx, _, _| {
        set_master_muted(ctx, !ctx.editor.session().is_master_muted());
        Ok(())
    });
    table.register("STRIP_MUTE_TOGGLE", Trigger, |ctx, action, _| {
        let index = action.index1()?;
        let strip = strip(ctx, index)?;
        strip.set_muted(!strip.is_muted());
        mixer_changed(ctx, Some(index));
        Ok(())
    });
    table.register("STRIP_SOLO_TOGGLE", Trigger, |ctx, action, _| {
        let index = action.index1()?;
        let strip = strip(ctx, index)?;
        strip.set_soloed(!strip.is_soloed());
        mixer_changed(ctx, Some(index));
        Ok(())
    });

    // song position
    table.register(">>_NEXT_BAR", Trigger, |ctx, _, _| {
        let session = ctx.editor.session();
        let next = session.engine_state().current_pattern + 1;
        if next >= session.patterns().len() {
            return Err(Error::NoSuchPattern(next));
        }
        session.locate(next);
        Ok(())
    });
    table.register("<<_PREVIOUS_BAR", Trigger, |ctx, _, _| {
        let session = ctx.editor.session();
        let current = session.engine_state().current_pattern;
        session.locate(current.saturating_sub(1));
        Ok(())
    });

    // tempo
    table.register("BPM_INCR", Trigger, |ctx, action, _| {
        let step = action.multiplier()?;
        nudge_tempo(ctx, step);
        Ok(())
    });
    table.register("BPM_DECR", Trigger, |ctx, action, _| {
        let step = action.multiplier()?;
        nudge_tempo(ctx, -step);
        Ok(())
    });
    table.register("BPM_CC_RELATIVE", Relative(tempo_class), |ctx, action, delta| {
        let step = action.multiplier()?;
        nudge_tempo(ctx, step * delta);
        Ok(())
    });
    table.register(
        "BPM_FINE_CC_RELATIVE",
        Relative(fine_tempo_class),
        |ctx, action, delta| {
            let step = action.multiplier()? * FINE_TEMPO_STEP;
            nudge_tempo(ctx, step * delta);
            Ok(())
        },
    );
    table.register("TAP_TEMPO", Trigger, |ctx, _, _| {
        if let Some(bpm) = ctx.tap_tempo.tap(ctx.now) {
            set_tempo(ctx, bpm);
        }
        Ok(())
    });
    table.register("BEATCOUNTER", Trigger, |ctx, _, _| {
        if let Some(bpm) = ctx.beat_counter.tap(ctx.now) {
            set_tempo(ctx, bpm);
        }
        Ok(())
    });

    // levels
    table.register(
        "MASTER_VOLUME_RELATIVE",
        Relative(master_volume_class),
        |ctx, _, delta| {
            nudge_by_controller(&ctx.editor.session().master_volume, delta);
            mixer_changed(ctx, None);
            Ok(())
        },
    );
    table.register("MASTER_VOLUME_ABSOLUTE", Absolute, |ctx, _, value| {
        ctx.editor.session().master_volume.set_from_midi(value);
        mixer_changed(ctx, None);
        Ok(())
    });
    table.register(
        "STRIP_VOLUME_RELATIVE",
        Relative(strip_volume_class),
        |ctx, action, delta| {
            let index = action.index1()?;
            nudge_by_controller(&strip(ctx, index)?.params.volume, delta);
            mixer_changed(ctx, Some(index));
            Ok(())
        },
    );
    table.register("STRIP_VOLUME_ABSOLUTE", Absolute, |ctx, action, value| {
        let index = action.index1()?;
        strip(ctx, index)?.params.volume.set_from_midi(value);
        mixer_changed(ctx, Some(index));
        Ok(())
    });
    table.register(
        "EFFECT_LEVEL_RELATIVE",
        Relative(effect_level_class),
        |ctx, action, delta| {
            let index = action.index1()?;
            let strip = strip(ctx, index)?;
            nudge_by_controller(fx_level(&strip, action)?, delta);
            mixer_changed(ctx, Some(index));
            Ok(())
        },
    );
    table.register("EFFECT_LEVEL_ABSOLUTE", Absolute, |ctx, action, value| {
        let index = action.index1()?;
        let strip = strip(ctx, index)?;
        fx_level(&strip, action)?.set_from_midi(value);
        mixer_changed(ctx, Some(index));
        Ok(())
    });
    table.register("PAN_RELATIVE", Relative(strip_pan_class), |ctx, action, delta| {
        let index = action.index1()?;
        nudge_by_controller(&strip(ctx, index)?.params.pan, delta);
        mixer_changed(ctx, Some(index));
        Ok(())
    });
    table.register("PAN_ABSOLUTE", Absolute, |ctx, action, value| {
        let index = action.index1()?;
        strip(ctx, index)?.params.pan.set_from_midi(value);
        mixer_changed(ctx, Some(index));
        Ok(())
    });
    table.register(
        "FILTER_CUTOFF_LEVEL_ABSOLUTE",
        Absolute,
        |ctx, action, value| {
            let index = action.index1()?;
            let strip = strip(ctx, index)?;
            strip.set_filter_active(true);
            strip.params.cutoff.set_from_midi(value);
            mixer_changed(ctx, Some(index));
            Ok(())
        },
    );
    table.register("GAIN_LEVEL_ABSOLUTE", Absolute, |ctx, action, value| {
        let index = action.index1()?;
        strip(ctx, index)?.params.gain.set_from_midi(value);
        mixer_changed(ctx, Some(index));
        Ok(())
    });
    table.register("PITCH_LEVEL_ABSOLUTE", Absolute, |ctx, action, value| {
        let index = action.index1()?;
        strip(ctx, index)?.params.pitch.set_from_midi(value);
        mixer_changed(ctx, Some(index));
        Ok(())
    });

    // pattern selection
    table.register("SELECT_NEXT_PATTERN", Trigger, |ctx, action, _| {
        select_next_pattern(ctx, action.index1()?)
    });
    table.register(
        "SELECT_NEXT_PATTERN_CC_ABSOLUTE",
        Absolute,
        |ctx, _, value| select_next_pattern(ctx, value.max(0.0) as usize),
    );
    table.register("SELECT_NEXT_PATTERN_PROMPTLY", Trigger, |ctx, action, _| {
        let index = action.index1()?;
        ctx.editor.select_pattern(index)?;
        if ctx.editor.session().is_playing() {
            ctx.editor.session().locate(index);
        }
        Ok(())
    });
    table.register("SELECT_NEXT_PATTERN_RELATIVE", Trigger, |ctx, action, _| {
        let offset = action.offset1()?;
        let target = ctx.editor.session().selected_pattern() as i64 + offset;
        if target < 0 {
            return Err(Error::InvalidParameter {
                action: action.identifier.clone(),
                field: "parameter1",
                value: action.parameter1.clone(),
            });
        }
        select_next_pattern(ctx, target as usize)
    });
    table.register("SELECT_AND_PLAY_PATTERN", Trigger, |ctx, action, _| {
        let index = action.index1()?;
        ctx.editor.select_pattern(index)?;
        ctx.editor.session().locate(index);
        ctx.editor.play()
    });

    table.register("SELECT_INSTRUMENT", Absolute, |ctx, _, value| {
        let count = ctx.editor.session().instruments().len();
        let wanted = value.max(0.0) as usize;
        if count == 0 {
            return Err(Error::NoSuchInstrument(wanted));
        }
        ctx.editor.select_instrument(wanted.min(count - 1));
        Ok(())
    });

    table.register("UNDO_ACTION", Trigger, |ctx, _, _| ctx.editor.undo());
    table.register("REDO_ACTION", Trigger, |ctx, _, _| ctx.editor.redo());

    // playlist
    table.register("PLAYLIST_SONG", Trigger, |ctx, action, _| {
        let index = action.index1()?;
        select_song(ctx, index as isize)
    });
    table.register("PLAYLIST_NEXT_SONG", Trigger, |ctx, _, _| {
        let index = ctx.editor.session().playlist_index() as isize + 1;
        select_song(ctx, index)
    });
    table.register("PLAYLIST_PREV_SONG", Trigger, |ctx, _, _| {
        let index = ctx.editor.session().playlist_index() as isize - 1;
        select_song(ctx, index)
    });

    table.register("TOGGLE_METRONOME", Trigger, |ctx, _, _| {
        let on = ctx.editor.session().toggle_metronome();
        ctx.editor.notify(Event::MetronomeToggled(on));
        Ok(())
    });
}

fn tempo_class(_: &Context<'_>, action: &Action) -> Result<ControllerClass> {
    action.multiplier()?;
    Ok(ControllerClass::Tempo)
}

fn fine_tempo_class(_: &Context<'_>, action: &Action) -> Result<ControllerClass> {
    action.multiplier()?;
    Ok(ControllerClass::FineTempo)
}

fn master_volume_class(_: &Context<'_>, _: &Action) -> Result<ControllerClass> {
    Ok(ControllerClass::MasterVolume)
}

fn strip_volume_class(ctx: &Context<'_>, action: &Action) -> Result<ControllerClass> {
    let index = action.index1()?;
    strip(ctx, index)?;
    Ok(ControllerClass::StripVolume(index))
}

fn strip_pan_class(ctx: &Context<'_>, action: &Action) -> Result<ControllerClass> {
    let index = action.index1()?;
    strip(ctx, index)?;
    Ok(ControllerClass::StripPan(index))
}

fn effect_level_class(ctx: &Context<'_>, action: &Action) -> Result<ControllerClass> {
    let index = action.index1()?;
    fx_level(&strip(ctx, index)?, action)?;
    Ok(ControllerClass::EffectLevel {
        strip: index,
        slot: action.index2()?,
    })
}

fn strip(ctx: &Context<'_>, index: usize) -> Result<Arc<Instrument>> {
    ctx.editor
        .session()
        .instruments()
        .get(index)
        .cloned()
        .ok_or(Error::NoSuchInstrument(index))
}

fn fx_level<'a>(strip: &'a Instrument, action: &Action) -> Result<&'a Param> {
    let slot = action.index2()?;
    if slot >= MAX_FX {
        return Err(Error::NoSuchEffect(slot));
    }
    strip.params.fx_level(slot).ok_or(Error::NoSuchEffect(slot))
}

/// Moves `param` by `steps` controller steps, where 127 steps span the
/// whole range.
fn nudge_by_controller(param: &Param, steps: f64) {
    param.nudge(steps * param.info().midi_step());
}

fn set_tempo(ctx: &Context<'_>, bpm: f64) {
    let session = ctx.editor.session();
    session.tempo.set(bpm);
    ctx.editor.notify(Event::TempoChanged(session.tempo.value()));
}

fn nudge_tempo(ctx: &Context<'_>, delta: f64) {
    let bpm = ctx.editor.session().tempo.value() + delta;
    set_tempo(ctx, bpm);
}

fn set_record_ready(ctx: &Context<'_>, ready: bool) {
    ctx.editor.session().set_record_ready(ready);
    ctx.editor.notify(Event::TransportChanged);
}

fn set_master_muted(ctx: &Context<'_>, muted: bool) {
    ctx.editor.session().set_master_muted(muted);
    mixer_changed(ctx, None);
}

fn mixer_changed(ctx: &Context<'_>, instrument: Option<usize>) {
    ctx.editor.notify(Event::MixerChanged { instrument });
}

/// Queues the pattern while playing, otherwise selects it right away.
fn select_next_pattern(ctx: &Context<'_>, index: usize) -> Result<()> {
    if ctx.editor.session().is_playing() {
        ctx.editor.queue_next_pattern(index)
    } else {
        ctx.editor.select_pattern(index)
    }
}

fn select_song(ctx: &Context<'_>, index: isize) -> Result<()> {
    let songs = ctx.editor.config().playlist.len();
    if index < 0 || index as usize >= songs {
        return Err(Error::NoSuchSong(index));
    }
    let index = index as usize;
    ctx.editor.session().set_playlist_index(index);
    ctx.editor.notify(Event::PlaylistSongChanged(index));
    Ok(())
}
