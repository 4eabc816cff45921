//! Inline menus
//!
//! Buttons are described by [`MenuAction`], which round-trips through the
//! component `custom_id`. Menus are plain data until they are turned into
//! serenity components at the edge.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use chrono::Weekday;
use serenity::builder::CreateComponents;
use serenity::model::application::component::ButtonStyle;

use crate::core::format::weekday_name;
use crate::core::response::{truncate_chars, BUTTON_LABEL_LIMIT};
use crate::database::{
    HomeworkEntry, Note, RecordId, ScheduleEntry, ScheduleSlot, LANGUAGES, THEMES,
};
use crate::features::forms::{EditField, HomeworkField, NoteField, ScheduleField};
use crate::features::validation::{weekday_from_index, weekday_index};

/// Discord allows five action rows of five buttons
const MAX_ROWS: usize = 5;
const MAX_BUTTONS_PER_ROW: usize = 5;
/// Item buttons that fit above the back row
pub const MAX_PICKER_ITEMS: usize = (MAX_ROWS - 1) * MAX_BUTTONS_PER_ROW;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Picker {
    Edit,
    Complete,
    Delete,
}

impl Picker {
    fn tag(&self) -> &'static str {
        match self {
            Picker::Edit => "edit",
            Picker::Complete => "complete",
            Picker::Delete => "delete",
        }
    }

    fn parse(tag: &str) -> Option<Self> {
        match tag {
            "edit" => Some(Picker::Edit),
            "complete" => Some(Picker::Complete),
            "delete" => Some(Picker::Delete),
            _ => None,
        }
    }
}

/// Everything a button can ask for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    Main,

    Schedule,
    ScheduleAdd,
    ScheduleAddOn(Weekday),
    ScheduleToday,
    ScheduleWeek,
    ScheduleDays,
    ScheduleDay(Weekday),
    SchedulePick(Picker),
    ScheduleEdit(RecordId),
    ScheduleEditField(RecordId, ScheduleField),
    ScheduleDelete(RecordId),

    Homework,
    HomeworkAdd,
    HomeworkToday,
    HomeworkWeek,
    HomeworkBySubject,
    HomeworkPick(Picker),
    HomeworkEdit(RecordId),
    HomeworkEditField(RecordId, HomeworkField),
    HomeworkComplete(RecordId),
    HomeworkDelete(RecordId),

    Notes,
    NoteAdd,
    NotesAll,
    NoteSearch,
    NotePick(Picker),
    NoteEdit(RecordId),
    NoteEditField(RecordId, NoteField),
    NoteDelete(RecordId),

    Reminders,
    Progress,

    Settings,
    SettingsLanguage,
    SetLanguage(String),
    SettingsTheme,
    SetTheme(String),
    SettingsReminderTime,
    ClearData,
    ClearDataConfirm,
}

impl MenuAction {
    pub fn custom_id(&self) -> String {
        match self {
            MenuAction::Main => "main".into(),

            MenuAction::Schedule => "schedule".into(),
            MenuAction::ScheduleAdd => "schedule:add".into(),
            MenuAction::ScheduleAddOn(day) => format!("schedule:add_on:{}", weekday_index(*day)),
            MenuAction::ScheduleToday => "schedule:today".into(),
            MenuAction::ScheduleWeek => "schedule:week".into(),
            MenuAction::ScheduleDays => "schedule:days".into(),
            MenuAction::ScheduleDay(day) => format!("schedule:day:{}", weekday_index(*day)),
            MenuAction::SchedulePick(picker) => format!("schedule:pick:{}", picker.tag()),
            MenuAction::ScheduleEdit(id) => format!("schedule:edit:{id}"),
            MenuAction::ScheduleEditField(id, field) => {
                format!("schedule:edit_field:{id}:{}", field.key())
            }
            MenuAction::ScheduleDelete(id) => format!("schedule:delete:{id}"),

            MenuAction::Homework => "homework".into(),
            MenuAction::HomeworkAdd => "homework:add".into(),
            MenuAction::HomeworkToday => "homework:today".into(),
            MenuAction::HomeworkWeek => "homework:week".into(),
            MenuAction::HomeworkBySubject => "homework:by_subject".into(),
            MenuAction::HomeworkPick(picker) => format!("homework:pick:{}", picker.tag()),
            MenuAction::HomeworkEdit(id) => format!("homework:edit:{id}"),
            MenuAction::HomeworkEditField(id, field) => {
                format!("homework:edit_field:{id}:{}", field.key())
            }
            MenuAction::HomeworkComplete(id) => format!("homework:complete:{id}"),
            MenuAction::HomeworkDelete(id) => format!("homework:delete:{id}"),

            MenuAction::Notes => "notes".into(),
            MenuAction::NoteAdd => "notes:add".into(),
            MenuAction::NotesAll => "notes:all".into(),
            MenuAction::NoteSearch => "notes:search".into(),
            MenuAction::NotePick(picker) => format!("notes:pick:{}", picker.tag()),
            MenuAction::NoteEdit(id) => format!("notes:edit:{id}"),
            MenuAction::NoteEditField(id, field) => {
                format!("notes:edit_field:{id}:{}", field.key())
            }
            MenuAction::NoteDelete(id) => format!("notes:delete:{id}"),

            MenuAction::Reminders => "reminders".into(),
            MenuAction::Progress => "progress".into(),

            MenuAction::Settings => "settings".into(),
            MenuAction::SettingsLanguage => "settings:language".into(),
            MenuAction::SetLanguage(code) => format!("settings:set_language:{code}"),
            MenuAction::SettingsTheme => "settings:theme".into(),
            MenuAction::SetTheme(code) => format!("settings:set_theme:{code}"),
            MenuAction::SettingsReminderTime => "settings:reminder_time".into(),
            MenuAction::ClearData => "settings:clear".into(),
            MenuAction::ClearDataConfirm => "settings:clear_confirm".into(),
        }
    }

    pub fn parse(custom_id: &str) -> Option<Self> {
        let parts: Vec<&str> = custom_id.split(':').collect();
        let id = |idx: usize| parts.get(idx).and_then(|raw| raw.parse::<RecordId>().ok());

        let action = match parts.as_slice() {
            ["main"] => MenuAction::Main,

            ["schedule"] => MenuAction::Schedule,
            ["schedule", "add"] => MenuAction::ScheduleAdd,
            ["schedule", "add_on", day] => {
                MenuAction::ScheduleAddOn(weekday_from_index(day.parse().ok()?)?)
            }
            ["schedule", "today"] => MenuAction::ScheduleToday,
            ["schedule", "week"] => MenuAction::ScheduleWeek,
            ["schedule", "days"] => MenuAction::ScheduleDays,
            ["schedule", "day", day] => {
                MenuAction::ScheduleDay(weekday_from_index(day.parse().ok()?)?)
            }
            ["schedule", "pick", picker] => MenuAction::SchedulePick(Picker::parse(picker)?),
            ["schedule", "edit", _] => MenuAction::ScheduleEdit(id(2)?),
            ["schedule", "edit_field", _, field] => {
                MenuAction::ScheduleEditField(id(2)?, ScheduleField::parse(field)?)
            }
            ["schedule", "delete", _] => MenuAction::ScheduleDelete(id(2)?),

            ["homework"] => MenuAction::Homework,
            ["homework", "add"] => MenuAction::HomeworkAdd,
            ["homework", "today"] => MenuAction::HomeworkToday,
            ["homework", "week"] => MenuAction::HomeworkWeek,
            ["homework", "by_subject"] => MenuAction::HomeworkBySubject,
            ["homework", "pick", picker] => MenuAction::HomeworkPick(Picker::parse(picker)?),
            ["homework", "edit", _] => MenuAction::HomeworkEdit(id(2)?),
            ["homework", "edit_field", _, field] => {
                MenuAction::HomeworkEditField(id(2)?, HomeworkField::parse(field)?)
            }
            ["homework", "complete", _] => MenuAction::HomeworkComplete(id(2)?),
            ["homework", "delete", _] => MenuAction::HomeworkDelete(id(2)?),

            ["notes"] => MenuAction::Notes,
            ["notes", "add"] => MenuAction::NoteAdd,
            ["notes", "all"] => MenuAction::NotesAll,
            ["notes", "search"] => MenuAction::NoteSearch,
            ["notes", "pick", picker] => MenuAction::NotePick(Picker::parse(picker)?),
            ["notes", "edit", _] => MenuAction::NoteEdit(id(2)?),
            ["notes", "edit_field", _, field] => {
                MenuAction::NoteEditField(id(2)?, NoteField::parse(field)?)
            }
            ["notes", "delete", _] => MenuAction::NoteDelete(id(2)?),

            ["reminders"] => MenuAction::Reminders,
            ["progress"] => MenuAction::Progress,

            ["settings"] => MenuAction::Settings,
            ["settings", "language"] => MenuAction::SettingsLanguage,
            ["settings", "set_language", code] => MenuAction::SetLanguage(code.to_string()),
            ["settings", "theme"] => MenuAction::SettingsTheme,
            ["settings", "set_theme", code] => MenuAction::SetTheme(code.to_string()),
            ["settings", "reminder_time"] => MenuAction::SettingsReminderTime,
            ["settings", "clear"] => MenuAction::ClearData,
            ["settings", "clear_confirm"] => MenuAction::ClearDataConfirm,

            _ => return None,
        };
        Some(action)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: MenuAction,
    pub style: ButtonStyle,
}

impl Button {
    fn new(label: impl AsRef<str>, action: MenuAction) -> Self {
        Self {
            label: truncate_chars(label.as_ref(), BUTTON_LABEL_LIMIT),
            action,
            style: ButtonStyle::Secondary,
        }
    }

    fn styled(mut self, style: ButtonStyle) -> Self {
        self.style = style;
        self
    }
}

/// Rows of buttons
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Menu {
    pub rows: Vec<Vec<Button>>,
}

impl Menu {
    fn from_buttons(buttons: Vec<Button>) -> Self {
        let rows = buttons
            .chunks(MAX_BUTTONS_PER_ROW)
            .map(|row| row.to_vec())
            .collect();
        Menu { rows }
    }

    fn with_back(mut self, target: MenuAction) -> Self {
        self.rows.truncate(MAX_ROWS - 1);
        self.rows.push(vec![Button::new("⬅️ Back", target)]);
        self
    }

    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.rows.iter().flatten()
    }

    pub fn to_components(&self) -> CreateComponents {
        let mut components = CreateComponents::default();
        for row in &self.rows {
            components.create_action_row(|action_row| {
                for button in row {
                    action_row.create_button(|b| {
                        b.custom_id(button.action.custom_id())
                            .label(&button.label)
                            .style(button.style)
                    });
                }
                action_row
            });
        }
        components
    }
}

pub fn main_menu() -> Menu {
    Menu::from_buttons(vec![
        Button::new("📅 Schedule", MenuAction::Schedule).styled(ButtonStyle::Primary),
        Button::new("📘 Homework", MenuAction::Homework).styled(ButtonStyle::Primary),
        Button::new("📝 Notes", MenuAction::Notes).styled(ButtonStyle::Primary),
        Button::new("⏰ Reminders", MenuAction::Reminders),
        Button::new("📊 Progress", MenuAction::Progress),
        Button::new("⚙️ Settings", MenuAction::Settings),
    ])
}

pub fn schedule_menu() -> Menu {
    Menu::from_buttons(vec![
        Button::new("➕ Add class", MenuAction::ScheduleAdd).styled(ButtonStyle::Success),
        Button::new("📅 Today", MenuAction::ScheduleToday),
        Button::new("🗓️ Week", MenuAction::ScheduleWeek),
        Button::new("📆 By day", MenuAction::ScheduleDays),
        Button::new("✏️ Edit", MenuAction::SchedulePick(Picker::Edit)),
        Button::new("🗑️ Delete", MenuAction::SchedulePick(Picker::Delete)),
    ])
    .with_back(MenuAction::Main)
}

/// One button per weekday, Monday first
///
/// Used both to pick the day of a new class (a typed date goes through the
/// form instead) and to pick which day's classes to show.
pub fn schedule_day_menu(action: impl Fn(Weekday) -> MenuAction) -> Menu {
    let days = (0..7)
        .filter_map(weekday_from_index)
        .map(|day| Button::new(weekday_name(day), action(day)))
        .collect();
    Menu::from_buttons(days).with_back(MenuAction::Schedule)
}

pub fn homework_menu() -> Menu {
    Menu::from_buttons(vec![
        Button::new("➕ Add", MenuAction::HomeworkAdd).styled(ButtonStyle::Success),
        Button::new("📅 Today", MenuAction::HomeworkToday),
        Button::new("🗓️ Week", MenuAction::HomeworkWeek),
        Button::new("📚 By subject", MenuAction::HomeworkBySubject),
        Button::new("✅ Complete", MenuAction::HomeworkPick(Picker::Complete)),
        Button::new("✏️ Edit", MenuAction::HomeworkPick(Picker::Edit)),
        Button::new("🗑️ Delete", MenuAction::HomeworkPick(Picker::Delete)),
    ])
    .with_back(MenuAction::Main)
}

pub fn notes_menu() -> Menu {
    Menu::from_buttons(vec![
        Button::new("➕ Add", MenuAction::NoteAdd).styled(ButtonStyle::Success),
        Button::new("📋 All notes", MenuAction::NotesAll),
        Button::new("🔍 Search", MenuAction::NoteSearch),
        Button::new("✏️ Edit", MenuAction::NotePick(Picker::Edit)),
        Button::new("🗑️ Delete", MenuAction::NotePick(Picker::Delete)),
    ])
    .with_back(MenuAction::Main)
}

pub fn settings_menu() -> Menu {
    Menu::from_buttons(vec![
        Button::new("🌐 Language", MenuAction::SettingsLanguage),
        Button::new("🎨 Theme", MenuAction::SettingsTheme),
        Button::new("⏰ Reminder time", MenuAction::SettingsReminderTime),
        Button::new("🗑️ Clear data", MenuAction::ClearData).styled(ButtonStyle::Danger),
    ])
    .with_back(MenuAction::Main)
}

pub fn language_menu() -> Menu {
    let buttons = LANGUAGES
        .iter()
        .map(|(code, name)| Button::new(*name, MenuAction::SetLanguage(code.to_string())))
        .collect();
    Menu::from_buttons(buttons).with_back(MenuAction::Settings)
}

pub fn theme_menu() -> Menu {
    let buttons = THEMES
        .iter()
        .map(|(code, name)| Button::new(*name, MenuAction::SetTheme(code.to_string())))
        .collect();
    Menu::from_buttons(buttons).with_back(MenuAction::Settings)
}

pub fn confirm_clear_menu() -> Menu {
    Menu::from_buttons(vec![
        Button::new("✅ Yes, delete everything", MenuAction::ClearDataConfirm)
            .styled(ButtonStyle::Danger),
        Button::new("❌ No", MenuAction::Settings),
    ])
}

pub fn back_to(target: MenuAction) -> Menu {
    Menu::default().with_back(target)
}

fn picker_style(picker: Picker) -> ButtonStyle {
    match picker {
        Picker::Edit => ButtonStyle::Primary,
        Picker::Complete => ButtonStyle::Success,
        Picker::Delete => ButtonStyle::Danger,
    }
}

fn picker_menu<T>(
    items: &[T],
    picker: Picker,
    label: impl Fn(&T) -> String,
    action: impl Fn(&T) -> MenuAction,
    back: MenuAction,
) -> Menu {
    let buttons = items
        .iter()
        .take(MAX_PICKER_ITEMS)
        .map(|item| Button::new(label(item), action(item)).styled(picker_style(picker)))
        .collect();
    Menu::from_buttons(buttons).with_back(back)
}

pub fn homework_picker(items: &[HomeworkEntry], picker: Picker) -> Menu {
    picker_menu(
        items,
        picker,
        |item| format!("{}: {}", item.subject, item.task),
        |item| match picker {
            Picker::Edit => MenuAction::HomeworkEdit(item.id),
            Picker::Complete => MenuAction::HomeworkComplete(item.id),
            Picker::Delete => MenuAction::HomeworkDelete(item.id),
        },
        MenuAction::Homework,
    )
}

pub fn schedule_picker(entries: &[ScheduleEntry], picker: Picker) -> Menu {
    picker_menu(
        entries,
        picker,
        |entry| {
            let day = match entry.slot {
                ScheduleSlot::Weekly(day) => weekday_name(day).to_string(),
                ScheduleSlot::Dated(date) => date.format("%d.%m").to_string(),
            };
            format!("{} {} {}", day, entry.time.format("%H:%M"), entry.subject)
        },
        |entry| match picker {
            Picker::Delete => MenuAction::ScheduleDelete(entry.id),
            _ => MenuAction::ScheduleEdit(entry.id),
        },
        MenuAction::Schedule,
    )
}

pub fn note_picker(notes: &[Note], picker: Picker) -> Menu {
    picker_menu(
        notes,
        picker,
        |note| note.title.clone(),
        |note| match picker {
            Picker::Delete => MenuAction::NoteDelete(note.id),
            _ => MenuAction::NoteEdit(note.id),
        },
        MenuAction::Notes,
    )
}

fn field_menu<F: EditField>(action: impl Fn(F) -> MenuAction, back: MenuAction) -> Menu {
    let buttons = F::ALL
        .iter()
        .map(|field| Button::new(field.label(), action(*field)).styled(ButtonStyle::Primary))
        .collect();
    Menu::from_buttons(buttons).with_back(back)
}

pub fn homework_field_menu(id: RecordId) -> Menu {
    field_menu(
        |field| MenuAction::HomeworkEditField(id, field),
        MenuAction::Homework,
    )
}

pub fn schedule_field_menu(id: RecordId) -> Menu {
    field_menu(
        |field| MenuAction::ScheduleEditField(id, field),
        MenuAction::Schedule,
    )
}

pub fn note_field_menu(id: RecordId) -> Menu {
    field_menu(|field| MenuAction::NoteEditField(id, field), MenuAction::Notes)
}
