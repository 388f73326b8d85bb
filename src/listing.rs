use std::cmp::Ordering;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::errors::{AppError, AppResult};
use crate::models::Named;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Ready,
    Error(String),
}

impl LoadState {
    /// `Ok` once the page is ready, otherwise the message shown in its place.
    pub fn check(&self) -> AppResult<()> {
        match self {
            LoadState::Ready => Ok(()),
            LoadState::Loading => Err(AppError::Load("Still loading.".into())),
            LoadState::Error(message) => Err(AppError::Load(message.clone())),
        }
    }
}

/// State transition applied to a canonical collection once the server has
/// confirmed the corresponding request.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation<T> {
    Added(T),
    Updated(T),
    Removed(i64),
    Imported(Vec<T>),
}

/// Result of an operation that asks for confirmation first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Cancelled,
}

#[async_trait]
pub trait Confirmation: Send + Sync {
    async fn confirm(&self, prompt: &str) -> bool;
}

/// Answers every prompt with a fixed value.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

#[async_trait]
impl Confirmation for FixedAnswer {
    async fn confirm(&self, prompt: &str) -> bool {
        debug!(target: "confirm", prompt, answer = self.0, "auto-answered prompt");
        self.0
    }
}

/// Case-insensitive, accent-folded ordering with the raw strings as a
/// tie-break so distinct names never compare equal.
pub fn collate(a: &str, b: &str) -> Ordering {
    let folded = fold_key(a).cmp(&fold_key(b));
    folded.then_with(|| a.cmp(b))
}

fn fold_key(value: &str) -> String {
    value.chars().flat_map(char::to_lowercase).map(fold_char).collect()
}

fn fold_char(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

/// Case-insensitive substring match on the display name.
pub fn matches_query<T: Named>(item: &T, query: &str) -> bool {
    let needle = query.to_lowercase();
    needle.is_empty() || item.display_name().to_lowercase().contains(&needle)
}

/// Items whose name contains `query`, sorted by name.
pub fn project<'a, T: Named>(items: &'a [T], query: &str) -> Vec<&'a T> {
    let mut visible: Vec<&T> = items
        .iter()
        .filter(|item| matches_query(*item, query))
        .collect();
    visible.sort_by(|a, b| collate(&a.display_name(), &b.display_name()));
    visible
}

fn sort_by_name<T: Named>(items: &mut [T]) {
    items.sort_by(|a, b| collate(&a.display_name(), &b.display_name()));
}

/// Owner of one page's canonical collection.
///
/// The visible list is always `project(items, query)`; it is cached and
/// rebuilt only after the collection or the query changes.
#[derive(Debug)]
pub struct ListController<T> {
    items: Vec<T>,
    query: String,
    state: LoadState,
    last_error: Option<String>,
    projection: Option<Vec<usize>>,
    rebuilds: u64,
}

impl<T> Default for ListController<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            query: String::new(),
            state: LoadState::Loading,
            last_error: None,
            projection: None,
            rebuilds: 0,
        }
    }
}

impl<T: Named> ListController<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ready(items: Vec<T>) -> Self {
        let mut list = Self::new();
        list.finish_load(Ok(items));
        list
    }

    pub fn finish_load(&mut self, result: AppResult<Vec<T>>) {
        match result {
            Ok(mut items) => {
                sort_by_name(&mut items);
                debug!(target: "listing", count = items.len(), "collection loaded");
                self.items = items;
                self.state = LoadState::Ready;
            }
            Err(err) => {
                let message = err.display_message();
                warn!(target: "listing", %message, "collection failed to load");
                self.items.clear();
                self.state = LoadState::Error(message);
            }
        }
        self.invalidate();
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.get(id).is_some()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        let query = query.into();
        if query != self.query {
            self.query = query;
            self.invalidate();
        }
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Number of times the cached projection has been rebuilt.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    pub fn visible(&mut self) -> Vec<&T> {
        if self.projection.is_none() {
            let indices = project_indices(&self.items, &self.query);
            self.rebuilds += 1;
            self.projection = Some(indices);
        }
        let indices = self.projection.as_deref().unwrap_or_default();
        indices.iter().filter_map(|&i| self.items.get(i)).collect()
    }

    pub fn added(&mut self, item: T) {
        match self.position(item.id()) {
            Some(index) => self.items[index] = item,
            None => self.items.push(item),
        }
        sort_by_name(&mut self.items);
        self.invalidate();
    }

    pub fn updated(&mut self, item: T) {
        if let Some(index) = self.position(item.id()) {
            self.items[index] = item;
            sort_by_name(&mut self.items);
            self.invalidate();
        }
    }

    pub fn removed(&mut self, id: i64) {
        let before = self.items.len();
        self.items.retain(|item| item.id() != id);
        if self.items.len() != before {
            self.invalidate();
        }
    }

    /// Appends records whose id is not already present; returns how many
    /// were inserted.
    pub fn merge_imported(&mut self, records: Vec<T>) -> usize {
        let mut inserted = 0;
        for record in records {
            if self.position(record.id()).is_none() {
                self.items.push(record);
                inserted += 1;
            }
        }
        if inserted > 0 {
            sort_by_name(&mut self.items);
            self.invalidate();
        }
        inserted
    }

    pub fn apply(&mut self, mutation: Mutation<T>) {
        match mutation {
            Mutation::Added(item) => self.added(item),
            Mutation::Updated(item) => self.updated(item),
            Mutation::Removed(id) => self.removed(id),
            Mutation::Imported(records) => {
                self.merge_imported(records);
            }
        }
    }

    /// Applies a confirmed mutation, or records the failure and leaves the
    /// collection untouched.
    pub fn settle(&mut self, result: AppResult<Mutation<T>>) -> AppResult<()> {
        match result {
            Ok(mutation) => {
                self.last_error = None;
                self.apply(mutation);
                Ok(())
            }
            Err(err) => {
                self.record_error(&err);
                Err(err)
            }
        }
    }

    pub fn record_error(&mut self, err: &AppError) {
        let message = err.display_message();
        warn!(target: "listing", %message, "mutation failed");
        self.last_error = Some(message);
    }

    fn position(&self, id: i64) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    fn invalidate(&mut self) {
        self.projection = None;
    }
}

fn project_indices<T: Named>(items: &[T], query: &str) -> Vec<usize> {
    let mut indices: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| matches_query(*item, query))
        .map(|(i, _)| i)
        .collect();
    indices.sort_by(|&a, &b| collate(&items[a].display_name(), &items[b].display_name()));
    indices
}

/// Searchable single-choice dropdown over any [`Named`] item.
#[derive(Debug, Clone)]
pub struct Picker<T> {
    items: Vec<T>,
    query: String,
    selected: Option<i64>,
}

impl<T: Named> Picker<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            query: String::new(),
            selected: None,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    /// Matching items in their original order.
    pub fn filtered(&self) -> Vec<&T> {
        self.items
            .iter()
            .filter(|item| matches_query(*item, &self.query))
            .collect()
    }

    pub fn select(&mut self, id: Option<i64>) -> Option<&T> {
        self.selected = id.filter(|id| self.items.iter().any(|item| item.id() == *id));
        self.selected()
    }

    pub fn selected(&self) -> Option<&T> {
        let id = self.selected?;
        self.items.iter().find(|item| item.id() == id)
    }

    /// Resolves free text to one item: an exact id, an exact name, or a
    /// single substring match.
    pub fn resolve(&mut self, input: &str) -> AppResult<&T> {
        let input = input.trim();
        let found = match self.exact_match(input) {
            Some(id) => id,
            None => {
                self.set_query(input);
                let matches = self.filtered();
                match matches.as_slice() {
                    [only] => only.id(),
                    [] => return Err(AppError::Validation(format!("no match for \"{input}\""))),
                    many => {
                        let names: Vec<String> = many
                            .iter()
                            .map(|item| item.display_name().into_owned())
                            .collect();
                        return Err(AppError::Validation(format!(
                            "\"{input}\" is ambiguous: {}",
                            names.join(", ")
                        )));
                    }
                }
            }
        };
        self.selected = Some(found);
        self.selected()
            .ok_or_else(|| AppError::Validation(format!("no match for \"{input}\"")))
    }

    fn exact_match(&self, input: &str) -> Option<i64> {
        if let Ok(id) = input.parse::<i64>() {
            if self.items.iter().any(|item| item.id() == id) {
                return Some(id);
            }
        }
        self.items
            .iter()
            .find(|item| item.display_name().eq_ignore_ascii_case(input))
            .map(|item| item.id())
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: i64,
        name: &'static str,
    }

    impl Named for Item {
        fn id(&self) -> i64 {
            self.id
        }

        fn display_name(&self) -> Cow<'_, str> {
            Cow::Borrowed(self.name)
        }
    }

    fn item(id: i64, name: &'static str) -> Item {
        Item { id, name }
    }

    fn names(items: &[&Item]) -> Vec<&'static str> {
        items.iter().map(|i| i.name).collect()
    }

    fn sample() -> Vec<Item> {
        vec![
            item(1, "Maria Souza"),
            item(2, "alberto Reis"),
            item(3, "Ângela Costa"),
            item(4, "Bruno Mariano"),
        ]
    }

    #[test]
    fn empty_query_returns_everything_sorted() {
        let items = sample();
        let visible = project(&items, "");
        assert_eq!(
            names(&visible),
            vec!["alberto Reis", "Ângela Costa", "Bruno Mariano", "Maria Souza"]
        );
    }

    #[test]
    fn filter_is_case_insensitive_substring() {
        let items = sample();
        let visible = project(&items, "MARI");
        assert_eq!(names(&visible), vec!["Bruno Mariano", "Maria Souza"]);
        assert!(project(&items, "zzz").is_empty());
    }

    #[test]
    fn surrounding_spaces_are_part_of_the_query() {
        let items = vec![item(1, "Ana Lima"), item(2, "Mariana Alves")];
        assert_eq!(names(&project(&items, "ana ")), vec!["Ana Lima"]);
        assert_eq!(names(&project(&items, " alves")), vec!["Mariana Alves"]);
        assert_eq!(project(&items, " ").len(), 2);
    }

    #[test]
    fn projection_is_idempotent() {
        let items = sample();
        let once: Vec<Item> = project(&items, "a").into_iter().cloned().collect();
        let twice: Vec<Item> = project(&once, "a").into_iter().cloned().collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn projection_is_cached_until_inputs_change() {
        let mut list = ListController::ready(sample());
        list.visible();
        list.visible();
        assert_eq!(list.rebuilds(), 1);

        list.set_query("");
        list.visible();
        assert_eq!(list.rebuilds(), 1);

        list.set_query("brun");
        assert_eq!(names(&list.visible()), vec!["Bruno Mariano"]);
        assert_eq!(list.rebuilds(), 2);

        list.added(item(5, "Bruna Dias"));
        assert_eq!(names(&list.visible()), vec!["Bruna Dias", "Bruno Mariano"]);
        assert_eq!(list.rebuilds(), 3);
    }

    #[test]
    fn added_appears_exactly_once() {
        let mut list = ListController::ready(sample());
        list.added(item(9, "Carla Nunes"));
        list.added(item(9, "Carla Nunes"));
        assert_eq!(list.items().iter().filter(|i| i.id == 9).count(), 1);
        assert_eq!(list.len(), 5);
    }

    #[test]
    fn updated_replaces_by_id_and_resorts() {
        let mut list = ListController::ready(sample());
        list.updated(item(1, "Aaron Souza"));
        assert_eq!(list.items()[0], item(1, "Aaron Souza"));
        list.updated(item(42, "Ghost"));
        assert!(!list.contains(42));
    }

    #[test]
    fn removed_drops_every_entry_with_that_id() {
        let mut list = ListController::ready(sample());
        list.removed(3);
        assert!(list.items().iter().all(|i| i.id != 3));
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn import_merge_skips_known_ids() {
        let mut list = ListController::ready(vec![item(1, "A"), item(2, "B")]);
        let inserted = list.merge_imported(vec![item(2, "B"), item(3, "C")]);
        assert_eq!(inserted, 1);
        let ids: Vec<i64> = list.items().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn failed_settle_keeps_state_and_records_message() {
        let mut list = ListController::ready(sample());
        let result = list.settle(Err(AppError::Api {
            status: 404,
            message: "Not found".into(),
        }));
        assert!(result.is_err());
        assert_eq!(list.len(), 4);
        assert_eq!(list.last_error(), Some("Not found"));

        list.settle(Ok(Mutation::Removed(1))).unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list.last_error(), None);
    }

    #[test]
    fn failed_load_enters_error_state() {
        let mut list: ListController<Item> = ListController::new();
        assert_eq!(list.state(), &LoadState::Loading);
        list.finish_load(Err(AppError::Api {
            status: 500,
            message: "database unavailable".into(),
        }));
        assert_eq!(
            list.state(),
            &LoadState::Error("database unavailable".into())
        );
        assert!(list.visible().is_empty());
    }

    #[test]
    fn picker_resolves_ids_names_and_unique_fragments() {
        let mut picker = Picker::new(sample());
        assert_eq!(picker.resolve("4").unwrap().name, "Bruno Mariano");
        assert_eq!(picker.resolve("maria souza").unwrap().id, 1);
        assert_eq!(picker.resolve("costa").unwrap().id, 3);
        assert!(picker.resolve("mari").is_err());
        assert!(picker.resolve("nobody").is_err());
        assert_eq!(picker.selected().map(|i| i.id), Some(3));
    }

    #[test]
    fn picker_selection_ignores_unknown_ids() {
        let mut picker = Picker::new(sample());
        assert!(picker.select(Some(99)).is_none());
        assert_eq!(picker.select(Some(2)).map(|i| i.id), Some(2));
        picker.set_query("souza");
        assert_eq!(names(&picker.filtered()), vec!["Maria Souza"]);
    }

    #[test]
    fn collation_folds_accents_and_case() {
        assert_ne!(collate("Ângela", "angela"), Ordering::Equal);
        assert_eq!(collate("ângela", "Bruno"), Ordering::Less);
        assert_eq!(collate("zoe", "Álvaro"), Ordering::Greater);
    }
}
