// Inbound chat front end
//
// Every chat message goes through `Bot::submit_command`. Messages starting
// with the command prefix are bot commands; everything else is expanded,
// parsed and, when valid, started on the sender's controller.

use super::outbound::MessageSink;
use crate::core::config::{BotConfig, ConfigError};
use crate::engine::controller::slots::{ACCESS_DENIED_MESSAGE, INVALID_SLOT_MESSAGE};
use crate::engine::controller::{
    ControllerManager, DeviceError, EngineError, Executor, SlotPolicy, SlotStore, VirtualDevice,
};
use crate::engine::input::{
    CommandSequence, InputGroup, InputParser, MacroError, MacroTable, ParseError, ParserLimits,
    Preprocessor, Profile, SlotAction, SlotKind, Synonyms, Token,
};
use log::{info, warn};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

/// A chat user as seen by the bot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub permission_level: u32,

    /// 0-based controller port this user plays on
    pub controller: usize,
}

impl User {
    pub fn new(name: impl Into<String>, permission_level: u32) -> Self {
        Self {
            name: name.into(),
            permission_level,
            controller: 0,
        }
    }

    pub fn with_controller(mut self, controller: usize) -> Self {
        self.controller = controller;
        self
    }
}

/// Why a chat message was not accepted
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("input is paused")]
    Paused,

    #[error("no controller on port {0}")]
    UnknownController(usize),

    #[error(transparent)]
    Macro(#[from] MacroError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Outcome of an accepted chat message
#[derive(Debug, Default)]
pub struct Submission {
    /// Text to send back to chat, if any
    pub reply: Option<String>,

    /// Thread executing the accepted input
    pub handle: Option<JoinHandle<Result<(), EngineError>>>,
}

impl Submission {
    fn reply(text: impl Into<String>) -> Self {
        Self {
            reply: Some(text.into()),
            handle: None,
        }
    }

    /// Block until the started input finishes
    pub fn join(self) -> Result<(), EngineError> {
        match self.handle {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|payload| std::panic::resume_unwind(payload)),
            None => Ok(()),
        }
    }
}

/// The chat-facing bot: macros, synonyms, permissions and controllers
pub struct Bot {
    profile: Arc<Profile>,
    limits: ParserLimits,
    macros: RwLock<MacroTable>,
    synonyms: Synonyms,
    manager: ControllerManager,
    slots: SlotPolicy,
    slot_press_ms: u32,
    store: Arc<dyn SlotStore>,
    prefix: String,
    elevated_level: u32,
}

impl Bot {
    /// Build a bot from configuration, one controller per device
    pub fn from_config(
        config: &BotConfig,
        devices: Vec<Box<dyn VirtualDevice>>,
        notifier: Arc<dyn MessageSink>,
        store: Arc<dyn SlotStore>,
    ) -> Result<Self, ConfigError> {
        let profile = Arc::new(Profile::for_console(config.console()?));
        let executor = Executor::new(notifier)
            .with_slot_press(Duration::from_millis(u64::from(config.slots.press_ms)));
        let manager = ControllerManager::new(profile.clone(), devices, executor);

        Ok(Self {
            profile,
            limits: config.parser_limits(),
            macros: RwLock::new(config.macro_table()?),
            synonyms: config.synonyms(),
            manager,
            slots: config.slot_policy(),
            slot_press_ms: config.slots.press_ms,
            store,
            prefix: config.chat.command_prefix.clone(),
            elevated_level: config.permissions.elevated_level,
        })
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn manager(&self) -> &ControllerManager {
        &self.manager
    }

    fn parser(&self) -> InputParser<'_> {
        InputParser::with_limits(&self.profile, self.limits)
    }

    /// Expand and parse chat text without executing it
    pub fn parse(&self, raw: &str) -> Result<CommandSequence, ParseError> {
        let macros = self.macros.read().unwrap_or_else(PoisonError::into_inner);
        let text = Preprocessor::new(&macros, &self.synonyms).expand(raw);
        self.parser().parse(&text)
    }

    /// Handle one chat message from `user`
    pub fn submit_command(&self, raw: &str, user: &User) -> Result<Submission, CommandError> {
        let message = raw.trim();
        if let Some(command) = message.strip_prefix(self.prefix.as_str()) {
            return self.run_command(command, user);
        }
        self.submit_input(message, user)
    }

    fn check_port(&self, user: &User) -> Result<(), CommandError> {
        if self.manager.controller(user.controller).is_none() {
            return Err(CommandError::UnknownController(user.controller));
        }
        if self.manager.is_paused(user.controller) {
            return Err(CommandError::Paused);
        }
        Ok(())
    }

    fn submit_input(&self, message: &str, user: &User) -> Result<Submission, CommandError> {
        self.check_port(user)?;

        let sequence = self.parse(message)?;
        if sequence.is_empty() {
            return Ok(Submission::default());
        }

        let groups = sequence.groups().len();
        let total_ms = sequence.total_ms();
        let handle = self.manager.spawn(sequence, user.controller)?;
        info!(
            "{}: {} groups ({} ms) on controller {}",
            user.name, groups, total_ms, user.controller
        );

        Ok(Submission {
            reply: Some(format!("Accepted {groups} inputs ({total_ms} ms)")),
            handle: Some(handle),
        })
    }

    fn run_command(&self, command: &str, user: &User) -> Result<Submission, CommandError> {
        let mut words = command.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(Submission::default());
        };
        let argument = words.next();

        match name.to_lowercase().as_str() {
            "savestate" => self.slot_command(SlotKind::Save, argument, user),
            "loadstate" => self.slot_command(SlotKind::Load, argument, user),
            "lastsave" => Ok(Submission::reply(self.last_slot_reply(SlotKind::Save))),
            "lastload" => Ok(Submission::reply(self.last_slot_reply(SlotKind::Load))),
            "addmacro" => {
                let template: String = words.collect();
                match argument {
                    Some(macro_name) => {
                        self.add_macro(macro_name, &template)?;
                        Ok(Submission::reply(format!("Added macro {}", macro_name.to_lowercase())))
                    }
                    None => Ok(Submission::reply("Usage: addmacro #name template")),
                }
            }
            "removemacro" => {
                if !self.is_elevated(user) {
                    return Ok(Submission::reply(ACCESS_DENIED_MESSAGE));
                }
                let reply = match argument {
                    Some(macro_name) if self.remove_macro(macro_name) => {
                        format!("Removed macro {}", macro_name.to_lowercase())
                    }
                    Some(macro_name) => format!("No macro named {}", macro_name.to_lowercase()),
                    None => "Usage: removemacro #name".to_string(),
                };
                Ok(Submission::reply(reply))
            }
            "macros" => {
                let macros = self.macros.read().unwrap_or_else(PoisonError::into_inner);
                let names: Vec<&str> = macros.names().collect();
                Ok(Submission::reply(if names.is_empty() {
                    "No macros defined".to_string()
                } else {
                    names.join(", ")
                }))
            }
            "pause" => {
                if !self.is_elevated(user) {
                    return Ok(Submission::reply(ACCESS_DENIED_MESSAGE));
                }
                self.manager.pause_all()?;
                Ok(Submission::reply("Input paused"))
            }
            "resume" => {
                if !self.is_elevated(user) {
                    return Ok(Submission::reply(ACCESS_DENIED_MESSAGE));
                }
                self.manager.resume_all();
                Ok(Submission::reply("Input resumed"))
            }
            "status" => Ok(Submission::reply(self.status())),
            other => {
                warn!("{}: unknown command {}", user.name, other);
                Ok(Submission::default())
            }
        }
    }

    fn is_elevated(&self, user: &User) -> bool {
        user.permission_level >= self.elevated_level
    }

    /// Gated save/load: policy check, last-slot record, then the press
    fn slot_command(
        &self,
        kind: SlotKind,
        argument: Option<&str>,
        user: &User,
    ) -> Result<Submission, CommandError> {
        self.check_port(user)?;

        let Some(slot) = argument.and_then(|arg| arg.parse::<u8>().ok()) else {
            return Ok(Submission::reply(INVALID_SLOT_MESSAGE));
        };
        let action = SlotAction { kind, slot };
        if let Err(rejection) = self.slots.authorize(action, user.permission_level) {
            warn!("{}: {}state {} refused: {}", user.name, kind.name(), slot, rejection);
            return Ok(Submission::reply(rejection.message()));
        }

        self.store.record_last_slot(kind, slot);
        let sequence = CommandSequence::from(vec![InputGroup::new(Token::slot(action, self.slot_press_ms))]);
        let handle = self.manager.spawn(sequence, user.controller)?;
        info!("{}: {}state {} on controller {}", user.name, kind.name(), slot, user.controller);

        let verb = match kind {
            SlotKind::Save => "Saving",
            SlotKind::Load => "Loading",
        };
        Ok(Submission {
            reply: Some(format!("{verb} state {slot}")),
            handle: Some(handle),
        })
    }

    fn last_slot_reply(&self, kind: SlotKind) -> String {
        match self.store.last_slot(kind) {
            Some(slot) => format!("Last {} state: {}", kind.name(), slot),
            None => format!("No {} state recorded", kind.name()),
        }
    }

    fn status(&self) -> String {
        let paused = if self.manager.is_paused(0) { ", paused" } else { "" };
        format!(
            "{} on {} controllers, {} running{}",
            self.profile.console().name(),
            self.manager.num_controllers(),
            self.manager.running_total(),
            paused
        )
    }

    /// Add or replace a macro.
    ///
    /// A macro without arguments must expand into valid input before it is
    /// stored. Macros with arguments can only be checked once called, so
    /// they are stored as given.
    pub fn add_macro(&self, name: &str, template: &str) -> Result<(), CommandError> {
        let name = name.to_lowercase();
        MacroTable::validate_name(&name)?;

        let mut macros = self.macros.write().unwrap_or_else(PoisonError::into_inner);
        if MacroTable::is_dynamic(&name) {
            macros.insert(&name, template)?;
        } else {
            let mut trial = macros.clone();
            trial.insert(&name, template)?;
            let expanded = Preprocessor::new(&trial, &self.synonyms).expand(&name);
            self.parser().parse(&expanded)?;
            *macros = trial;
        }
        info!("macro {} = {}", name, template);
        Ok(())
    }

    /// Remove a macro, returning whether it existed
    pub fn remove_macro(&self, name: &str) -> bool {
        self.macros
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    /// The stored template of a macro
    pub fn macro_template(&self, name: &str) -> Option<String> {
        self.macros
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name.to_lowercase())
            .map(str::to_string)
    }
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("console", &self.profile.console())
            .field("manager", &self.manager)
            .field("prefix", &self.prefix)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::outbound::BufferedSink;
    use crate::engine::controller::{DeviceInput, MemorySlotStore, RecordingDevice, INTERLOCK_MESSAGE};
    use crate::engine::input::Button;

    struct Harness {
        bot: Bot,
        devices: Vec<RecordingDevice>,
        sink: Arc<BufferedSink>,
    }

    fn harness(config_text: &str) -> Harness {
        let mut config = BotConfig::from_toml(config_text).unwrap();
        config.slots.press_ms = 10;

        let devices: Vec<RecordingDevice> = (0..config.controllers.count).map(RecordingDevice::new).collect();
        let boxed = devices
            .iter()
            .map(|d| Box::new(d.clone()) as Box<dyn VirtualDevice>)
            .collect();
        let sink = Arc::new(BufferedSink::new());
        let bot = Bot::from_config(&config, boxed, sink.clone(), Arc::new(MemorySlotStore::new())).unwrap();
        Harness { bot, devices, sink }
    }

    fn viewer() -> User {
        User::new("viewer", 0)
    }

    fn moderator() -> User {
        User::new("mod", 3)
    }

    #[test]
    fn test_input_is_executed() {
        let h = harness("");
        let submission = h.bot.submit_command("a20ms", &viewer()).unwrap();
        assert_eq!(submission.reply.as_deref(), Some("Accepted 1 inputs (20 ms)"));
        submission.join().unwrap();

        assert_eq!(h.devices[0].values(DeviceInput::Button(5)), vec![1, 0]);
    }

    #[test]
    fn test_input_goes_to_user_port() {
        let h = harness("");
        h.bot
            .submit_command("b10ms", &viewer().with_controller(1))
            .unwrap()
            .join()
            .unwrap();
        assert!(h.devices[0].events().is_empty());
        assert_eq!(h.devices[1].values(DeviceInput::Button(6)), vec![1, 0]);
    }

    #[test]
    fn test_parse_error_rejects_whole_command() {
        let h = harness("");
        let err = h.bot.submit_command("a10ms up150%", &viewer()).unwrap_err();
        match err {
            CommandError::Parse(parse) => assert_eq!(parse.code(), "ERR_INVALID_PERCENTAGE"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(h.devices[0].events().is_empty());
    }

    #[test]
    fn test_unknown_port() {
        let h = harness("");
        let err = h.bot.submit_command("a", &viewer().with_controller(5)).unwrap_err();
        assert!(matches!(err, CommandError::UnknownController(5)));
    }

    #[test]
    fn test_config_macros_and_synonyms() {
        let h = harness("[macros]\n\"#jump\" = \"a10ms\"");
        let sequence = h.bot.parse("#jump + b10ms kappa20ms").unwrap();
        assert_eq!(sequence.groups().len(), 2);
        assert_eq!(sequence.groups()[0].len(), 2);
    }

    #[test]
    fn test_add_static_macro_is_validated() {
        let h = harness("");
        let err = h.bot.add_macro("#bad", "up150%").unwrap_err();
        assert!(matches!(err, CommandError::Parse(ParseError::InvalidPercentage { .. })));
        assert_eq!(h.bot.macro_template("#bad"), None);

        h.bot.add_macro("#Spin", "left right").unwrap();
        assert_eq!(h.bot.macro_template("#spin").as_deref(), Some("leftright"));
    }

    #[test]
    fn test_add_dynamic_macro_is_stored_unchecked() {
        let h = harness("");
        h.bot.add_macro("#hold(*)", "_<0>").unwrap();
        assert_eq!(h.bot.parse("#hold(a)").unwrap().groups().len(), 1);
        assert!(h.bot.parse("#hold(zz)").is_err());
    }

    #[test]
    fn test_add_macro_invalid_name() {
        let h = harness("");
        assert!(matches!(
            h.bot.add_macro("jump", "a"),
            Err(CommandError::Macro(MacroError::MissingMarker(_)))
        ));
    }

    #[test]
    fn test_macro_commands() {
        let h = harness("");
        let reply = h.bot.submit_command("!addmacro #dash right 500ms", &viewer()).unwrap().reply;
        assert_eq!(reply.as_deref(), Some("Added macro #dash"));
        assert_eq!(h.bot.macro_template("#dash").as_deref(), Some("right500ms"));

        let reply = h.bot.submit_command("!removemacro #dash", &viewer()).unwrap().reply;
        assert_eq!(reply.as_deref(), Some("Access denied"));

        let reply = h.bot.submit_command("!removemacro #dash", &moderator()).unwrap().reply;
        assert_eq!(reply.as_deref(), Some("Removed macro #dash"));

        let reply = h.bot.submit_command("!macros", &viewer()).unwrap().reply;
        assert_eq!(reply.as_deref(), Some("No macros defined"));
    }

    #[test]
    fn test_savestate_permissions() {
        let h = harness("");
        let reply = h.bot.submit_command("!savestate 2", &viewer()).unwrap().reply;
        assert_eq!(reply.as_deref(), Some("Access denied"));

        let reply = h.bot.submit_command("!savestate 9", &moderator()).unwrap().reply;
        assert_eq!(reply.as_deref(), Some("Invalid number."));

        let reply = h.bot.submit_command("!savestate x", &moderator()).unwrap().reply;
        assert_eq!(reply.as_deref(), Some("Invalid number."));

        assert!(h.devices[0].events().is_empty());
    }

    #[test]
    fn test_configured_slot_count_above_physical_slots() {
        let h = harness("[slots]\ncount = 9");
        let reply = h.bot.submit_command("!savestate 7", &moderator()).unwrap().reply;
        assert_eq!(reply.as_deref(), Some("Invalid number."));

        let reply = h.bot.submit_command("!loadstate 7", &viewer()).unwrap().reply;
        assert_eq!(reply.as_deref(), Some("Invalid number."));

        assert!(h.devices[0].events().is_empty());
    }

    #[test]
    fn test_oversized_repetition_is_rejected() {
        let h = harness("");
        let err = h.bot.submit_command("[[[a0ms]*99]*99]*99", &viewer()).unwrap_err();
        match err {
            CommandError::Parse(parse) => assert_eq!(parse.code(), "ERR_INVALID_INPUT"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(h.devices[0].events().is_empty());
    }

    #[test]
    fn test_savestate_presses_and_records() {
        let h = harness("");
        let submission = h.bot.submit_command("!savestate 2", &moderator()).unwrap();
        assert_eq!(submission.reply.as_deref(), Some("Saving state 2"));
        submission.join().unwrap();
        assert_eq!(h.devices[0].values(DeviceInput::Button(20)), vec![1, 0]);

        let reply = h.bot.submit_command("!lastsave", &viewer()).unwrap().reply;
        assert_eq!(reply.as_deref(), Some("Last save state: 2"));
        let reply = h.bot.submit_command("!lastload", &viewer()).unwrap().reply;
        assert_eq!(reply.as_deref(), Some("No load state recorded"));
    }

    #[test]
    fn test_loadstate_is_not_gated() {
        let h = harness("");
        let submission = h.bot.submit_command("!loadstate 1", &viewer()).unwrap();
        assert_eq!(submission.reply.as_deref(), Some("Loading state 1"));
        submission.join().unwrap();
        assert_eq!(h.devices[0].values(DeviceInput::Button(25)), vec![1, 0]);
    }

    #[test]
    fn test_pause_and_resume() {
        let h = harness("");
        h.bot.submit_command("_a0ms", &viewer()).unwrap().join().unwrap();
        assert!(h.bot.manager().controller(0).unwrap().is_held(Button::A));

        let reply = h.bot.submit_command("!pause", &viewer()).unwrap().reply;
        assert_eq!(reply.as_deref(), Some("Access denied"));

        h.bot.submit_command("!pause", &moderator()).unwrap();
        assert!(h.bot.manager().controller(0).unwrap().state().is_neutral());
        assert!(matches!(
            h.bot.submit_command("a", &viewer()),
            Err(CommandError::Paused)
        ));
        assert!(h.bot.status().ends_with(", paused"));

        h.bot.submit_command("!resume", &moderator()).unwrap();
        assert!(h.bot.submit_command("a0ms", &viewer()).is_ok());
    }

    #[test]
    fn test_interlock_message_reaches_chat() {
        let h = harness("");
        h.bot
            .submit_command("a100ms+b100ms+select100ms+start100ms", &viewer())
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(h.sink.take(), vec![INTERLOCK_MESSAGE.to_string()]);
    }

    #[test]
    fn test_status() {
        let h = harness("[input]\nconsole = \"n64\"\n[controllers]\ncount = 1");
        assert_eq!(h.bot.status(), "n64 on 1 controllers, 0 running");
    }

    #[test]
    fn test_unknown_command_is_ignored() {
        let h = harness("");
        let submission = h.bot.submit_command("!dance", &viewer()).unwrap();
        assert!(submission.reply.is_none());
        assert!(submission.handle.is_none());
    }
}
