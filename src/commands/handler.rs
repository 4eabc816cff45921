//! Conversation routing
//!
//! Turns text, commands and button presses into [`Screen`]s. Nothing here
//! talks to Discord; the event handler in the binary sends what comes back.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use anyhow::Result;
use chrono::{Datelike, Duration, Local, NaiveDateTime};
use log::{debug, error, info};
use std::sync::Arc;

use super::context::CommandContext;
use super::menus::{
    back_to, confirm_clear_menu, homework_field_menu, homework_menu, homework_picker,
    language_menu, main_menu, note_field_menu, note_picker, notes_menu, schedule_day_menu,
    schedule_field_menu, schedule_menu, schedule_picker, settings_menu, theme_menu, Menu,
    MenuAction, Picker,
};
use crate::core::format::{
    format_date, render_homework_list, render_notes_list, render_pending_jobs, render_progress,
    render_schedule_day, render_week_schedule, weekday_name,
};
use crate::database::{
    HomeworkFilter, ScheduleFilter, ScheduleSlot, SettingsPatch, UserSettings, LANGUAGES, THEMES,
};
use crate::database::supabase::next_date_for;
use crate::features::forms::{Edit, FormReply, FormState, SKIP_TOKEN};

const GENERIC_FAILURE: &str = "❌ Something went wrong. Please try again later.";

const WELCOME: &str = "👋 **Welcome to your study assistant!**\n\n\
I can help you organise your studies:\n\n\
📅 **Schedule** - your classes for every day\n\
📘 **Homework** - tasks and deadlines\n\
📝 **Notes** - keep and search notes\n\
⏰ **Reminders** - classes and deadlines\n\
📊 **Progress** - how much homework is done\n\
⚙️ **Settings** - language, theme and reminder time\n\n\
Choose a section below:";

/// A reply: text plus an optional menu under it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub text: String,
    pub menu: Option<Menu>,
}

impl Screen {
    pub fn new(text: impl Into<String>, menu: Menu) -> Self {
        Self {
            text: text.into(),
            menu: Some(menu),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            menu: None,
        }
    }
}

/// Commands typed as text or sent as slash commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Menu,
    Cancel,
    Skip,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Menu => "menu",
            Command::Cancel => "cancel",
            Command::Skip => "skip",
        }
    }

    /// `/start` and friends, as typed in a message
    pub fn parse(input: &str) -> Option<Self> {
        let name = input.trim().strip_prefix('/')?;
        [Command::Start, Command::Menu, Command::Cancel, Command::Skip]
            .into_iter()
            .find(|command| command.name().eq_ignore_ascii_case(name))
    }
}

fn section_of(state: &FormState) -> MenuAction {
    match state {
        FormState::Homework(_) | FormState::EditHomework(_) | FormState::HomeworkBySubject => {
            MenuAction::Homework
        }
        FormState::Schedule(_) | FormState::EditSchedule(_) => MenuAction::Schedule,
        FormState::Note(_) | FormState::EditNote(_) | FormState::NoteSearch => MenuAction::Notes,
        FormState::ReminderTime => MenuAction::Settings,
    }
}

fn section_menu(section: &MenuAction) -> Menu {
    match section {
        MenuAction::Homework => homework_menu(),
        MenuAction::Schedule => schedule_menu(),
        MenuAction::Notes => notes_menu(),
        MenuAction::Settings => settings_menu(),
        _ => main_menu(),
    }
}

fn lookup_name<'a>(table: &'a [(&'a str, &'a str)], code: &str) -> Option<&'a str> {
    table.iter().find(|(c, _)| *c == code).map(|(_, name)| *name)
}

fn render_settings(settings: &UserSettings) -> String {
    format!(
        "⚙️ **Settings**\n\n🌐 Language: {}\n🎨 Theme: {}\n⏰ Reminder time: {}",
        lookup_name(&LANGUAGES, &settings.language).unwrap_or(settings.language.as_str()),
        lookup_name(&THEMES, &settings.theme).unwrap_or(settings.theme.as_str()),
        settings.reminder_time.format("%H:%M")
    )
}

#[derive(Clone)]
pub struct ConversationHandler {
    ctx: Arc<CommandContext>,
}

impl ConversationHandler {
    pub fn new(ctx: Arc<CommandContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &CommandContext {
        &self.ctx
    }

    pub async fn on_command(&self, conversation: &str, owner: &str, command: Command) -> Screen {
        match command {
            Command::Start | Command::Menu => {
                self.ctx.forms.cancel(conversation);
                self.ensure_settings(owner).await;
                Screen::new(WELCOME, main_menu())
            }
            Command::Cancel => {
                let text = if self.ctx.forms.cancel(conversation) {
                    "❌ Cancelled"
                } else {
                    "Nothing to cancel"
                };
                Screen::new(text, main_menu())
            }
            Command::Skip => match self.on_form_input(conversation, owner, SKIP_TOKEN).await {
                Some(screen) => screen,
                None => Screen::text("Nothing to skip right now"),
            },
        }
    }

    /// Plain text. `None` when there is nothing to answer.
    pub async fn on_text(&self, conversation: &str, owner: &str, text: &str) -> Option<Screen> {
        if let Some(command) = Command::parse(text) {
            return Some(self.on_command(conversation, owner, command).await);
        }
        self.on_form_input(conversation, owner, text).await
    }

    async fn on_form_input(&self, conversation: &str, owner: &str, text: &str) -> Option<Screen> {
        let section = self
            .ctx
            .forms
            .current(conversation)
            .map(|state| section_of(&state))?;

        let screen = match self.ctx.forms.submit(conversation, owner, text).await {
            FormReply::Idle => return None,
            FormReply::Prompt(prompt) => Screen::new(prompt, back_to(section)),
            reply @ FormReply::Retry { .. } => {
                Screen::new(reply.text().unwrap_or_default(), back_to(section))
            }
            FormReply::Done(text) | FormReply::Failed(text) => {
                Screen::new(text, section_menu(&section))
            }
        };
        Some(screen)
    }

    pub async fn on_action(&self, conversation: &str, owner: &str, action: MenuAction) -> Screen {
        self.on_action_at(conversation, owner, action, Local::now().naive_local())
            .await
    }

    /// Any button press abandons the form in progress
    pub async fn on_action_at(
        &self,
        conversation: &str,
        owner: &str,
        action: MenuAction,
        now: NaiveDateTime,
    ) -> Screen {
        if self.ctx.forms.cancel(conversation) {
            debug!("Form in {} abandoned by navigation", conversation);
        }
        let custom_id = action.custom_id();
        match self.dispatch(conversation, owner, action, now).await {
            Ok(screen) => screen,
            Err(e) => {
                error!("Action {} failed for {}: {:#}", custom_id, owner, e);
                Screen::new(GENERIC_FAILURE, main_menu())
            }
        }
    }

    async fn ensure_settings(&self, owner: &str) {
        match self
            .ctx
            .store
            .get_or_create_settings(owner, self.ctx.reminders.default_reminder_time())
            .await
        {
            Ok(settings) => {
                if self.ctx.reminders.register_daily(owner, settings.reminder_time) {
                    info!("Daily reminders enabled for {}", owner);
                }
            }
            Err(e) => error!("Failed to load settings for {}: {}", owner, e),
        }
    }

    fn begin(&self, conversation: &str, state: FormState, heading: Option<String>) -> Screen {
        let section = section_of(&state);
        let prompt = self.ctx.forms.begin(conversation, state);
        let text = match heading {
            Some(heading) => format!("{heading}\n\n{prompt}"),
            None => prompt,
        };
        Screen::new(text, back_to(section))
    }

    async fn rederive_homework(&self, owner: &str) {
        if let Err(e) = self.ctx.reminders.setup_homework_reminders(owner).await {
            error!("Failed to derive homework reminders for {}: {}", owner, e);
        }
    }

    async fn settings_screen(&self, owner: &str, notice: Option<&str>) -> Result<Screen> {
        let settings = self
            .ctx
            .store
            .get_or_create_settings(owner, self.ctx.reminders.default_reminder_time())
            .await?;
        let mut text = render_settings(&settings);
        if let Some(notice) = notice {
            text = format!("{notice}\n\n{text}");
        }
        Ok(Screen::new(text, settings_menu()))
    }

    async fn dispatch(
        &self,
        conversation: &str,
        owner: &str,
        action: MenuAction,
        now: NaiveDateTime,
    ) -> Result<Screen> {
        let store = &self.ctx.store;
        let today = now.date();

        let screen = match action {
            MenuAction::Main => {
                self.ensure_settings(owner).await;
                Screen::new(WELCOME, main_menu())
            }

            // Schedule
            MenuAction::Schedule => Screen::new("📅 **Schedule**\n\nChoose an action:", schedule_menu()),
            MenuAction::ScheduleAdd => {
                let mut screen = self.begin(conversation, FormState::schedule(), None);
                screen.menu = Some(schedule_day_menu(MenuAction::ScheduleAddOn));
                screen
            }
            MenuAction::ScheduleAddOn(day) => self.begin(
                conversation,
                FormState::schedule_on(day),
                Some(format!("📅 {}", weekday_name(day))),
            ),
            MenuAction::ScheduleToday => {
                let entries = store.list_schedule(owner, ScheduleFilter::On(today)).await?;
                let title = format!("Today, {}", weekday_name(today.weekday()));
                Screen::new(render_schedule_day(&title, &entries), schedule_menu())
            }
            MenuAction::ScheduleWeek => {
                let horizon = today + Duration::days(6);
                let entries: Vec<_> = store
                    .list_schedule(owner, ScheduleFilter::All)
                    .await?
                    .into_iter()
                    .filter(|entry| match entry.slot {
                        ScheduleSlot::Weekly(_) => true,
                        ScheduleSlot::Dated(date) => date >= today && date <= horizon,
                    })
                    .collect();
                Screen::new(render_week_schedule(&entries), schedule_menu())
            }
            MenuAction::ScheduleDays => Screen::new(
                "📆 Which day do you want to see?",
                schedule_day_menu(MenuAction::ScheduleDay),
            ),
            MenuAction::ScheduleDay(day) => {
                let date = next_date_for(day, today);
                let entries = store.list_schedule(owner, ScheduleFilter::On(date)).await?;
                let title = format!("{}, {}", weekday_name(day), format_date(date));
                Screen::new(render_schedule_day(&title, &entries), schedule_menu())
            }
            MenuAction::SchedulePick(picker) => {
                let entries = store.list_schedule(owner, ScheduleFilter::All).await?;
                if entries.is_empty() {
                    Screen::new("📅 No classes yet", schedule_menu())
                } else {
                    let verb = if picker == Picker::Delete { "delete" } else { "edit" };
                    Screen::new(
                        format!("Choose a class to {verb}:"),
                        schedule_picker(&entries, picker),
                    )
                }
            }
            MenuAction::ScheduleEdit(id) => match store.get_schedule(owner, id).await? {
                Some(entry) => {
                    let mut screen = self.begin(
                        conversation,
                        FormState::EditSchedule(Edit::new(id)),
                        Some(format!("✏️ **{}**", entry.subject)),
                    );
                    screen.menu = Some(schedule_field_menu(id));
                    screen
                }
                None => Screen::new("❌ Class not found", schedule_menu()),
            },
            MenuAction::ScheduleEditField(id, field) => {
                match store.get_schedule(owner, id).await? {
                    Some(_) => self.begin(
                        conversation,
                        FormState::EditSchedule(Edit::with_field(id, field)),
                        None,
                    ),
                    None => Screen::new("❌ Class not found", schedule_menu()),
                }
            }
            MenuAction::ScheduleDelete(id) => {
                if store.delete_schedule(owner, id).await? {
                    info!("Deleted schedule entry {} for {}", id, owner);
                    self.ctx.reminders.refresh(owner).await;
                    Screen::new("🗑️ Class deleted", schedule_menu())
                } else {
                    Screen::new("❌ Class not found", schedule_menu())
                }
            }

            // Homework
            MenuAction::Homework => Screen::new("📘 **Homework**\n\nChoose an action:", homework_menu()),
            MenuAction::HomeworkAdd => self.begin(conversation, FormState::homework(), None),
            MenuAction::HomeworkToday => {
                let items = store.list_homework(owner, &HomeworkFilter::due_on(today)).await?;
                Screen::new(render_homework_list("Due today", &items), homework_menu())
            }
            MenuAction::HomeworkWeek => {
                let horizon = today + Duration::days(7);
                let items: Vec<_> = store
                    .list_homework(owner, &HomeworkFilter::pending())
                    .await?
                    .into_iter()
                    .filter(|item| matches!(item.deadline, Some(d) if d >= today && d <= horizon))
                    .collect();
                Screen::new(render_homework_list("Due this week", &items), homework_menu())
            }
            MenuAction::HomeworkBySubject => {
                self.begin(conversation, FormState::HomeworkBySubject, None)
            }
            MenuAction::HomeworkPick(picker) => {
                let filter = match picker {
                    Picker::Delete => HomeworkFilter::everything(),
                    _ => HomeworkFilter::pending(),
                };
                let items = store.list_homework(owner, &filter).await?;
                if items.is_empty() {
                    Screen::new("📘 No homework here", homework_menu())
                } else {
                    let verb = match picker {
                        Picker::Edit => "edit",
                        Picker::Complete => "mark as done",
                        Picker::Delete => "delete",
                    };
                    Screen::new(
                        format!("Choose homework to {verb}:"),
                        homework_picker(&items, picker),
                    )
                }
            }
            MenuAction::HomeworkEdit(id) => match store.get_homework(owner, id).await? {
                Some(item) => {
                    let mut screen = self.begin(
                        conversation,
                        FormState::EditHomework(Edit::new(id)),
                        Some(format!("✏️ **{}**: {}", item.subject, item.task)),
                    );
                    screen.menu = Some(homework_field_menu(id));
                    screen
                }
                None => Screen::new("❌ Homework item not found", homework_menu()),
            },
            MenuAction::HomeworkEditField(id, field) => {
                match store.get_homework(owner, id).await? {
                    Some(_) => self.begin(
                        conversation,
                        FormState::EditHomework(Edit::with_field(id, field)),
                        None,
                    ),
                    None => Screen::new("❌ Homework item not found", homework_menu()),
                }
            }
            MenuAction::HomeworkComplete(id) => {
                if store.complete_homework(owner, id).await? {
                    info!("Homework {} completed by {}", id, owner);
                    self.rederive_homework(owner).await;
                    if let Err(e) = self.ctx.achievements.check_and_unlock(owner).await {
                        error!("Failed to check achievements for {}: {}", owner, e);
                    }
                    Screen::new("✅ Homework marked as done", homework_menu())
                } else {
                    Screen::new("❌ Homework item not found", homework_menu())
                }
            }
            MenuAction::HomeworkDelete(id) => {
                if store.delete_homework(owner, id).await? {
                    info!("Deleted homework {} for {}", id, owner);
                    self.rederive_homework(owner).await;
                    Screen::new("🗑️ Homework deleted", homework_menu())
                } else {
                    Screen::new("❌ Homework item not found", homework_menu())
                }
            }

            // Notes
            MenuAction::Notes => Screen::new("📝 **Notes**\n\nChoose an action:", notes_menu()),
            MenuAction::NoteAdd => self.begin(conversation, FormState::note(), None),
            MenuAction::NotesAll => {
                let notes = store.list_notes(owner).await?;
                Screen::new(render_notes_list(&notes), notes_menu())
            }
            MenuAction::NoteSearch => self.begin(conversation, FormState::NoteSearch, None),
            MenuAction::NotePick(picker) => {
                let notes = store.list_notes(owner).await?;
                if notes.is_empty() {
                    Screen::new("📝 No notes yet", notes_menu())
                } else {
                    let verb = if picker == Picker::Delete { "delete" } else { "edit" };
                    Screen::new(format!("Choose a note to {verb}:"), note_picker(&notes, picker))
                }
            }
            MenuAction::NoteEdit(id) => match store.get_note(owner, id).await? {
                Some(note) => {
                    let mut screen = self.begin(
                        conversation,
                        FormState::EditNote(Edit::new(id)),
                        Some(format!("✏️ **{}**", note.title)),
                    );
                    screen.menu = Some(note_field_menu(id));
                    screen
                }
                None => Screen::new("❌ Note not found", notes_menu()),
            },
            MenuAction::NoteEditField(id, field) => match store.get_note(owner, id).await? {
                Some(_) => self.begin(
                    conversation,
                    FormState::EditNote(Edit::with_field(id, field)),
                    None,
                ),
                None => Screen::new("❌ Note not found", notes_menu()),
            },
            MenuAction::NoteDelete(id) => {
                if store.delete_note(owner, id).await? {
                    info!("Deleted note {} for {}", id, owner);
                    Screen::new("🗑️ Note deleted", notes_menu())
                } else {
                    Screen::new("❌ Note not found", notes_menu())
                }
            }

            MenuAction::Reminders => {
                let jobs = self.ctx.reminders.pending(owner);
                Screen::new(render_pending_jobs(&jobs, now), back_to(MenuAction::Main))
            }
            MenuAction::Progress => {
                let stats = store.homework_stats(owner).await?;
                let achievements = store.list_achievements(owner).await?;
                Screen::new(render_progress(&stats, &achievements), back_to(MenuAction::Main))
            }

            // Settings
            MenuAction::Settings => self.settings_screen(owner, None).await?,
            MenuAction::SettingsLanguage => Screen::new("🌐 Choose a language:", language_menu()),
            MenuAction::SetLanguage(code) => match lookup_name(&LANGUAGES, &code) {
                Some(name) => {
                    store
                        .get_or_create_settings(owner, self.ctx.reminders.default_reminder_time())
                        .await?;
                    let patch = SettingsPatch {
                        language: Some(code.clone()),
                        ..SettingsPatch::default()
                    };
                    store.update_settings(owner, &patch).await?;
                    self.settings_screen(owner, Some(&format!("✅ Language set to {name}")))
                        .await?
                }
                None => Screen::new("❌ Unknown language", language_menu()),
            },
            MenuAction::SettingsTheme => Screen::new("🎨 Choose a theme:", theme_menu()),
            MenuAction::SetTheme(code) => match lookup_name(&THEMES, &code) {
                Some(name) => {
                    store
                        .get_or_create_settings(owner, self.ctx.reminders.default_reminder_time())
                        .await?;
                    let patch = SettingsPatch {
                        theme: Some(code.clone()),
                        ..SettingsPatch::default()
                    };
                    store.update_settings(owner, &patch).await?;
                    self.settings_screen(owner, Some(&format!("✅ Theme set to {name}")))
                        .await?
                }
                None => Screen::new("❌ Unknown theme", theme_menu()),
            },
            MenuAction::SettingsReminderTime => {
                self.begin(conversation, FormState::ReminderTime, None)
            }
            MenuAction::ClearData => Screen::new(
                "⚠️ **Delete all data?**\n\nYour schedule, homework and notes will be removed. This cannot be undone.",
                confirm_clear_menu(),
            ),
            MenuAction::ClearDataConfirm => {
                store.clear_user_data(owner).await?;
                info!("Cleared all data for {}", owner);
                self.ctx.reminders.refresh(owner).await;
                Screen::new("🗑️ All your data was deleted", main_menu())
            }
        };
        Ok(screen)
    }
}
