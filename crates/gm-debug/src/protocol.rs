//! Wire messages: four-ASCII-char tag followed by packed little-endian
//! fields. One [`Command`]/[`Reply`] per transport frame; framing (finding
//! where one message ends and the next begins) is the transport's job, not
//! this crate's — [`Session`](crate::Session) is handed whole frames by its
//! pump and hands whole frames to its sender.

use crate::error::{DebugError, DebugResult};
use gm_io::{Endian, Reader, Writer};

/// Sentinel meaning "no thread scope" in a breakpoint, matching the
/// scheduler's thread ids (which start at 1).
const NO_THREAD_SCOPE: u32 = 0;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `mrun` — resume every thread, clearing step/break state.
    Run,
    /// `msin` — step into on one thread.
    StepInto { thread: u32 },
    /// `msov` — step over on one thread.
    StepOver { thread: u32 },
    /// `msou` — step out on one thread.
    StepOut { thread: u32 },
    /// `mgct` — get one frame of a thread's call trace.
    GetCallTrace { thread: u32, frame: u32 },
    /// `mgsr` — get a source blob by id.
    GetSource { source: u32 },
    /// `mgsi` — get source info (stub; always replies `Done`).
    GetSourceInfo,
    /// `mgti` — get info for every live thread.
    GetThreadInfo,
    /// `mgvi` — get variable info (stub; always replies `Done`).
    GetVariableInfo { var: u32 },
    /// `msbp` — set or clear (when `enabled` is false) a breakpoint.
    SetBreakpoint {
        rid: u32,
        source: u32,
        line: u32,
        thread: Option<u32>,
        enabled: bool,
    },
    /// `mbrk` — force one thread to break at its next instruction.
    Break { thread: u32 },
    /// `mend` — end the debug session.
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadInfoState {
    Running,
    Sleeping,
    Blocked,
    Exception,
    Killed,
}

impl From<gm_vm::ThreadState> for ThreadInfoState {
    fn from(state: gm_vm::ThreadState) -> Self {
        match state {
            gm_vm::ThreadState::Running => ThreadInfoState::Running,
            gm_vm::ThreadState::Sleeping => ThreadInfoState::Sleeping,
            gm_vm::ThreadState::Blocked => ThreadInfoState::Blocked,
            gm_vm::ThreadState::Exception => ThreadInfoState::Exception,
            gm_vm::ThreadState::Killed => ThreadInfoState::Killed,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// `dbrk` — a thread broke.
    Broke { thread: u32, source: u32, line: u32 },
    /// `drun` — acknowledges a run/resume.
    Running,
    /// `dstp` — acknowledges a step command was armed.
    Stepped { thread: u32 },
    /// `dsrc` — one source blob.
    Source { source: u32, name: String, text: String },
    /// `dctx` — one call-trace frame, part of a group terminated by `Done`.
    ContextFrame { frame: u32, source: u32, line: u32, function_name: String },
    /// `dthi` — one thread's info, part of a group terminated by `Done`.
    ThreadInfo { thread: u32, state: ThreadInfoState },
    /// `done` — terminates a `dctx`/`dthi` group, or stands alone for the
    /// `mgsi`/`mgvi` stubs.
    Done,
    /// `derr` — the last command failed.
    Error { message: String },
    /// `dmsg` — an informational message (e.g. forwarded script output).
    Message { text: String },
    /// `dack` — generic acknowledgement.
    Ack,
    /// `dend` — the session has ended.
    End,
    /// `dexc` — a thread raised an exception.
    Exception { thread: u32, message: String },
}

fn tag_of(bytes: &[u8]) -> DebugResult<[u8; 4]> {
    bytes
        .get(..4)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| DebugError::Malformed("message shorter than a 4-byte tag".into()))
}

pub fn decode_command(bytes: &[u8]) -> DebugResult<Command> {
    let tag = tag_of(bytes)?;
    let mut r = Reader::new(bytes[4..].to_vec(), Endian::Little);
    Ok(match &tag {
        b"mrun" => Command::Run,
        b"msin" => Command::StepInto { thread: r.read_u32()? },
        b"msov" => Command::StepOver { thread: r.read_u32()? },
        b"msou" => Command::StepOut { thread: r.read_u32()? },
        b"mgct" => Command::GetCallTrace { thread: r.read_u32()?, frame: r.read_u32()? },
        b"mgsr" => Command::GetSource { source: r.read_u32()? },
        b"mgsi" => Command::GetSourceInfo,
        b"mgti" => Command::GetThreadInfo,
        b"mgvi" => Command::GetVariableInfo { var: r.read_u32()? },
        b"msbp" => {
            let rid = r.read_u32()?;
            let source = r.read_u32()?;
            let line = r.read_u32()?;
            let thread_raw = r.read_u32()?;
            let enabled = r.read_u32()? != 0;
            let thread = (thread_raw != NO_THREAD_SCOPE).then_some(thread_raw);
            Command::SetBreakpoint { rid, source, line, thread, enabled }
        }
        b"mbrk" => Command::Break { thread: r.read_u32()? },
        b"mend" => Command::End,
        _ => return Err(DebugError::UnknownTag(tag)),
    })
}

pub fn encode_command(command: &Command) -> Vec<u8> {
    let mut w = Writer::new(Endian::Little);
    match command {
        Command::Run => w.write_bytes(b"mrun"),
        Command::StepInto { thread } => {
            w.write_bytes(b"msin");
            w.write_u32(*thread);
        }
        Command::StepOver { thread } => {
            w.write_bytes(b"msov");
            w.write_u32(*thread);
        }
        Command::StepOut { thread } => {
            w.write_bytes(b"msou");
            w.write_u32(*thread);
        }
        Command::GetCallTrace { thread, frame } => {
            w.write_bytes(b"mgct");
            w.write_u32(*thread);
            w.write_u32(*frame);
        }
        Command::GetSource { source } => {
            w.write_bytes(b"mgsr");
            w.write_u32(*source);
        }
        Command::GetSourceInfo => w.write_bytes(b"mgsi"),
        Command::GetThreadInfo => w.write_bytes(b"mgti"),
        Command::GetVariableInfo { var } => {
            w.write_bytes(b"mgvi");
            w.write_u32(*var);
        }
        Command::SetBreakpoint { rid, source, line, thread, enabled } => {
            w.write_bytes(b"msbp");
            w.write_u32(*rid);
            w.write_u32(*source);
            w.write_u32(*line);
            w.write_u32(thread.unwrap_or(NO_THREAD_SCOPE));
            w.write_u32(*enabled as u32);
        }
        Command::Break { thread } => {
            w.write_bytes(b"mbrk");
            w.write_u32(*thread);
        }
        Command::End => w.write_bytes(b"mend"),
    }
    w.into_bytes()
}

pub fn decode_reply(bytes: &[u8]) -> DebugResult<Reply> {
    let tag = tag_of(bytes)?;
    let mut r = Reader::new(bytes[4..].to_vec(), Endian::Little);
    Ok(match &tag {
        b"dbrk" => Reply::Broke { thread: r.read_u32()?, source: r.read_u32()?, line: r.read_u32()? },
        b"drun" => Reply::Running,
        b"dstp" => Reply::Stepped { thread: r.read_u32()? },
        b"dsrc" => Reply::Source { source: r.read_u32()?, name: r.read_cstring()?, text: r.read_cstring()? },
        b"dctx" => Reply::ContextFrame {
            frame: r.read_u32()?,
            source: r.read_u32()?,
            line: r.read_u32()?,
            function_name: r.read_cstring()?,
        },
        b"dthi" => {
            let thread = r.read_u32()?;
            let state = match r.read_u32()? {
                0 => ThreadInfoState::Running,
                1 => ThreadInfoState::Sleeping,
                2 => ThreadInfoState::Blocked,
                3 => ThreadInfoState::Exception,
                4 => ThreadInfoState::Killed,
                other => return Err(DebugError::Malformed(format!("unknown thread state tag {other}"))),
            };
            Reply::ThreadInfo { thread, state }
        }
        b"done" => Reply::Done,
        b"derr" => Reply::Error { message: r.read_cstring()? },
        b"dmsg" => Reply::Message { text: r.read_cstring()? },
        b"dack" => Reply::Ack,
        b"dend" => Reply::End,
        b"dexc" => Reply::Exception { thread: r.read_u32()?, message: r.read_cstring()? },
        _ => return Err(DebugError::UnknownTag(tag)),
    })
}

pub fn encode_reply(reply: &Reply) -> Vec<u8> {
    let mut w = Writer::new(Endian::Little);
    match reply {
        Reply::Broke { thread, source, line } => {
            w.write_bytes(b"dbrk");
            w.write_u32(*thread);
            w.write_u32(*source);
            w.write_u32(*line);
        }
        Reply::Running => w.write_bytes(b"drun"),
        Reply::Stepped { thread } => {
            w.write_bytes(b"dstp");
            w.write_u32(*thread);
        }
        Reply::Source { source, name, text } => {
            w.write_bytes(b"dsrc");
            w.write_u32(*source);
            w.write_cstring(name);
            w.write_cstring(text);
        }
        Reply::ContextFrame { frame, source, line, function_name } => {
            w.write_bytes(b"dctx");
            w.write_u32(*frame);
            w.write_u32(*source);
            w.write_u32(*line);
            w.write_cstring(function_name);
        }
        Reply::ThreadInfo { thread, state } => {
            w.write_bytes(b"dthi");
            w.write_u32(*thread);
            w.write_u32(match state {
                ThreadInfoState::Running => 0,
                ThreadInfoState::Sleeping => 1,
                ThreadInfoState::Blocked => 2,
                ThreadInfoState::Exception => 3,
                ThreadInfoState::Killed => 4,
            });
        }
        Reply::Done => w.write_bytes(b"done"),
        Reply::Error { message } => {
            w.write_bytes(b"derr");
            w.write_cstring(message);
        }
        Reply::Message { text } => {
            w.write_bytes(b"dmsg");
            w.write_cstring(text);
        }
        Reply::Ack => w.write_bytes(b"dack"),
        Reply::End => w.write_bytes(b"dend"),
        Reply::Exception { thread, message } => {
            w.write_bytes(b"dexc");
            w.write_u32(*thread);
            w.write_cstring(message);
        }
    }
    w.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_command() {
        let commands = vec![
            Command::Run,
            Command::StepInto { thread: 3 },
            Command::StepOver { thread: 3 },
            Command::StepOut { thread: 3 },
            Command::GetCallTrace { thread: 3, frame: 1 },
            Command::GetSource { source: 2 },
            Command::GetSourceInfo,
            Command::GetThreadInfo,
            Command::GetVariableInfo { var: 0 },
            Command::SetBreakpoint { rid: 9, source: 0, line: 10, thread: None, enabled: true },
            Command::SetBreakpoint { rid: 9, source: 0, line: 10, thread: Some(3), enabled: false },
            Command::Break { thread: 3 },
            Command::End,
        ];
        for c in commands {
            let bytes = encode_command(&c);
            assert_eq!(decode_command(&bytes).unwrap(), c);
        }
    }

    #[test]
    fn round_trips_every_reply() {
        let replies = vec![
            Reply::Broke { thread: 1, source: 0, line: 5 },
            Reply::Running,
            Reply::Stepped { thread: 1 },
            Reply::Source { source: 0, name: "main.gm".into(), text: "x = 1;".into() },
            Reply::ContextFrame { frame: 0, source: 0, line: 5, function_name: "main".into() },
            Reply::ThreadInfo { thread: 1, state: ThreadInfoState::Sleeping },
            Reply::Done,
            Reply::Error { message: "bad breakpoint".into() },
            Reply::Message { text: "hello".into() },
            Reply::Ack,
            Reply::End,
            Reply::Exception { thread: 1, message: "no operator overload".into() },
        ];
        for r in replies {
            let bytes = encode_reply(&r);
            assert_eq!(decode_reply(&bytes).unwrap(), r);
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert!(matches!(decode_command(b"xxxx"), Err(DebugError::UnknownTag(_))));
    }
}
