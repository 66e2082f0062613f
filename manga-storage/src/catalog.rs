//! Authoritative catalog store seams.
//!
//! One repository trait per aggregate. The API's Postgres catalog and the
//! in-memory catalog below both implement all four.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use manga_core::{
    Chapter, ChapterUpdate, EntityId, EntityKind, Manga, MangaFilter, MangaResult, MangaUpdate,
    NewChapter, NewManga, NewPage, NewUser, Page, PageUpdate, StorageError, User,
};

// ============================================================================
// REPOSITORY TRAITS
// ============================================================================

#[async_trait]
pub trait MangaRepository: Send + Sync {
    async fn create(&self, input: NewManga) -> MangaResult<Manga>;

    /// `MangaError::NotFound` when absent.
    async fn get(&self, id: EntityId) -> MangaResult<Manga>;

    /// Filtered page of manga, most recently updated first.
    async fn list(&self, filter: &MangaFilter) -> MangaResult<Vec<Manga>>;

    async fn update(&self, id: EntityId, update: MangaUpdate) -> MangaResult<Manga>;

    /// Delete a manga together with its chapters and their pages.
    async fn delete(&self, id: EntityId) -> MangaResult<()>;

    /// Attach a genre. Attaching an existing genre is a no-op.
    async fn add_genre(&self, id: EntityId, genre: &str) -> MangaResult<()>;

    /// Detach a genre. Detaching an absent genre is a no-op.
    async fn remove_genre(&self, id: EntityId, genre: &str) -> MangaResult<()>;

    /// Genres of a manga, sorted by name.
    async fn genres(&self, id: EntityId) -> MangaResult<Vec<String>>;
}

#[async_trait]
pub trait ChapterRepository: Send + Sync {
    async fn create(&self, input: NewChapter) -> MangaResult<Chapter>;
    async fn get(&self, id: EntityId) -> MangaResult<Chapter>;
    /// Chapters of a manga ordered by number.
    async fn list_by_manga(&self, manga_id: EntityId) -> MangaResult<Vec<Chapter>>;
    async fn update(&self, id: EntityId, update: ChapterUpdate) -> MangaResult<Chapter>;
    /// Delete a chapter together with its pages.
    async fn delete(&self, id: EntityId) -> MangaResult<()>;
    /// Returns how many chapters were removed.
    async fn delete_by_manga(&self, manga_id: EntityId) -> MangaResult<u64>;
}

#[async_trait]
pub trait PageRepository: Send + Sync {
    async fn create(&self, input: NewPage) -> MangaResult<Page>;
    async fn get(&self, id: EntityId) -> MangaResult<Page>;
    /// Pages of a chapter ordered by number.
    async fn list_by_chapter(&self, chapter_id: EntityId) -> MangaResult<Vec<Page>>;
    async fn update(&self, id: EntityId, update: PageUpdate) -> MangaResult<Page>;
    async fn delete(&self, id: EntityId) -> MangaResult<()>;
    async fn delete_by_chapter(&self, chapter_id: EntityId) -> MangaResult<u64>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// `MangaError::Conflict` when the username or email is taken.
    async fn create(&self, input: NewUser) -> MangaResult<User>;
    async fn get(&self, id: EntityId) -> MangaResult<User>;
    async fn get_by_username(&self, username: &str) -> MangaResult<User>;
    async fn get_by_email(&self, email: &str) -> MangaResult<User>;
    /// Persist username, email, password hash and role of `user`.
    async fn update(&self, user: &User) -> MangaResult<User>;
    async fn delete(&self, id: EntityId) -> MangaResult<()>;
}

// ============================================================================
// IN-MEMORY CATALOG
// ============================================================================

#[derive(Debug)]
struct Table<T> {
    last_id: EntityId,
    rows: BTreeMap<EntityId, T>,
}

// Rows need not be Default themselves.
impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            last_id: 0,
            rows: BTreeMap::new(),
        }
    }
}

impl<T> Table<T> {
    fn next_id(&mut self) -> EntityId {
        self.last_id += 1;
        self.last_id
    }
}

#[derive(Debug, Default)]
struct CatalogState {
    manga: Table<Manga>,
    chapters: Table<Chapter>,
    pages: Table<Page>,
    users: Table<User>,
}

impl CatalogState {
    fn remove_chapter_pages(&mut self, chapter_id: EntityId) -> u64 {
        let before = self.pages.rows.len();
        self.pages.rows.retain(|_, p| p.chapter_id != chapter_id);
        (before - self.pages.rows.len()) as u64
    }

    fn remove_manga_chapters(&mut self, manga_id: EntityId) -> u64 {
        let chapter_ids: Vec<EntityId> = self
            .chapters
            .rows
            .values()
            .filter(|c| c.manga_id == manga_id)
            .map(|c| c.id)
            .collect();
        for chapter_id in &chapter_ids {
            self.chapters.rows.remove(chapter_id);
            self.remove_chapter_pages(*chapter_id);
        }
        chapter_ids.len() as u64
    }

    fn ensure_unique_user(
        &self,
        username: &str,
        email: &str,
        except: Option<EntityId>,
    ) -> Result<(), StorageError> {
        for user in self.users.rows.values() {
            if Some(user.id) == except {
                continue;
            }
            if user.username == username {
                return Err(conflict("username", username));
            }
            if user.email == email {
                return Err(conflict("email", email));
            }
        }
        Ok(())
    }
}

fn conflict(field: &str, value: &str) -> StorageError {
    StorageError::AlreadyExists {
        entity: EntityKind::User,
        field: field.to_string(),
        value: value.to_string(),
    }
}

fn not_found(entity: EntityKind, id: EntityId) -> StorageError {
    StorageError::NotFound { entity, id }
}

/// Catalog held in process memory, for tests and local development.
///
/// All four tables sit behind one lock, so cascading deletes are atomic.
/// Ids are assigned per table starting at 1.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    state: Arc<RwLock<CatalogState>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, CatalogState>, StorageError> {
        self.state.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, CatalogState>, StorageError> {
        self.state.write().map_err(|_| StorageError::LockPoisoned)
    }

    pub fn manga_count(&self) -> usize {
        self.read().map(|s| s.manga.rows.len()).unwrap_or_default()
    }

    pub fn chapter_count(&self) -> usize {
        self.read().map(|s| s.chapters.rows.len()).unwrap_or_default()
    }

    pub fn page_count(&self) -> usize {
        self.read().map(|s| s.pages.rows.len()).unwrap_or_default()
    }

    pub fn user_count(&self) -> usize {
        self.read().map(|s| s.users.rows.len()).unwrap_or_default()
    }
}

#[async_trait]
impl MangaRepository for InMemoryCatalog {
    async fn create(&self, input: NewManga) -> MangaResult<Manga> {
        let mut state = self.write()?;
        let now = Utc::now();
        let mut genres = input.genres;
        genres.sort();
        genres.dedup();
        let manga = Manga {
            id: state.manga.next_id(),
            title: input.title,
            description: input.description,
            cover_image: input.cover_image,
            status: input.status,
            author: input.author,
            artist: input.artist,
            genres,
            created_at: now,
            updated_at: now,
        };
        state.manga.rows.insert(manga.id, manga.clone());
        Ok(manga)
    }

    async fn get(&self, id: EntityId) -> MangaResult<Manga> {
        let state = self.read()?;
        Ok(state
            .manga
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(EntityKind::Manga, id))?)
    }

    async fn list(&self, filter: &MangaFilter) -> MangaResult<Vec<Manga>> {
        let filter = filter.clone().normalized();
        let state = self.read()?;
        let mut matching: Vec<&Manga> = state
            .manga
            .rows
            .values()
            .filter(|m| filter.matches(m))
            .collect();
        matching.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(matching
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .cloned()
            .collect())
    }

    async fn update(&self, id: EntityId, update: MangaUpdate) -> MangaResult<Manga> {
        let mut state = self.write()?;
        let manga = state
            .manga
            .rows
            .get_mut(&id)
            .ok_or_else(|| not_found(EntityKind::Manga, id))?;
        update.apply(manga);
        manga.updated_at = Utc::now();
        Ok(manga.clone())
    }

    async fn delete(&self, id: EntityId) -> MangaResult<()> {
        let mut state = self.write()?;
        if state.manga.rows.remove(&id).is_none() {
            return Err(not_found(EntityKind::Manga, id).into());
        }
        state.remove_manga_chapters(id);
        Ok(())
    }

    async fn add_genre(&self, id: EntityId, genre: &str) -> MangaResult<()> {
        let mut state = self.write()?;
        let manga = state
            .manga
            .rows
            .get_mut(&id)
            .ok_or_else(|| not_found(EntityKind::Manga, id))?;
        if let Err(pos) = manga.genres.binary_search_by(|g| g.as_str().cmp(genre)) {
            manga.genres.insert(pos, genre.to_string());
        }
        Ok(())
    }

    async fn remove_genre(&self, id: EntityId, genre: &str) -> MangaResult<()> {
        let mut state = self.write()?;
        let manga = state
            .manga
            .rows
            .get_mut(&id)
            .ok_or_else(|| not_found(EntityKind::Manga, id))?;
        manga.genres.retain(|g| g != genre);
        Ok(())
    }

    async fn genres(&self, id: EntityId) -> MangaResult<Vec<String>> {
        Ok(MangaRepository::get(self, id).await?.genres)
    }
}

#[async_trait]
impl ChapterRepository for InMemoryCatalog {
    async fn create(&self, input: NewChapter) -> MangaResult<Chapter> {
        let mut state = self.write()?;
        if !state.manga.rows.contains_key(&input.manga_id) {
            return Err(not_found(EntityKind::Manga, input.manga_id).into());
        }
        let now = Utc::now();
        let chapter = Chapter {
            id: state.chapters.next_id(),
            manga_id: input.manga_id,
            number: input.number,
            title: input.title,
            created_at: now,
            updated_at: now,
        };
        state.chapters.rows.insert(chapter.id, chapter.clone());
        Ok(chapter)
    }

    async fn get(&self, id: EntityId) -> MangaResult<Chapter> {
        let state = self.read()?;
        Ok(state
            .chapters
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(EntityKind::Chapter, id))?)
    }

    async fn list_by_manga(&self, manga_id: EntityId) -> MangaResult<Vec<Chapter>> {
        let state = self.read()?;
        let mut chapters: Vec<Chapter> = state
            .chapters
            .rows
            .values()
            .filter(|c| c.manga_id == manga_id)
            .cloned()
            .collect();
        chapters.sort_by(|a, b| a.number.total_cmp(&b.number).then(a.id.cmp(&b.id)));
        Ok(chapters)
    }

    async fn update(&self, id: EntityId, update: ChapterUpdate) -> MangaResult<Chapter> {
        let mut state = self.write()?;
        let chapter = state
            .chapters
            .rows
            .get_mut(&id)
            .ok_or_else(|| not_found(EntityKind::Chapter, id))?;
        update.apply(chapter);
        chapter.updated_at = Utc::now();
        Ok(chapter.clone())
    }

    async fn delete(&self, id: EntityId) -> MangaResult<()> {
        let mut state = self.write()?;
        if state.chapters.rows.remove(&id).is_none() {
            return Err(not_found(EntityKind::Chapter, id).into());
        }
        state.remove_chapter_pages(id);
        Ok(())
    }

    async fn delete_by_manga(&self, manga_id: EntityId) -> MangaResult<u64> {
        let mut state = self.write()?;
        Ok(state.remove_manga_chapters(manga_id))
    }
}

#[async_trait]
impl PageRepository for InMemoryCatalog {
    async fn create(&self, input: NewPage) -> MangaResult<Page> {
        let mut state = self.write()?;
        if !state.chapters.rows.contains_key(&input.chapter_id) {
            return Err(not_found(EntityKind::Chapter, input.chapter_id).into());
        }
        let now = Utc::now();
        let page = Page {
            id: state.pages.next_id(),
            chapter_id: input.chapter_id,
            number: input.number,
            image_path: input.image_path,
            created_at: now,
            updated_at: now,
        };
        state.pages.rows.insert(page.id, page.clone());
        Ok(page)
    }

    async fn get(&self, id: EntityId) -> MangaResult<Page> {
        let state = self.read()?;
        Ok(state
            .pages
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(EntityKind::Page, id))?)
    }

    async fn list_by_chapter(&self, chapter_id: EntityId) -> MangaResult<Vec<Page>> {
        let state = self.read()?;
        let mut pages: Vec<Page> = state
            .pages
            .rows
            .values()
            .filter(|p| p.chapter_id == chapter_id)
            .cloned()
            .collect();
        pages.sort_by_key(|p| (p.number, p.id));
        Ok(pages)
    }

    async fn update(&self, id: EntityId, update: PageUpdate) -> MangaResult<Page> {
        let mut state = self.write()?;
        if let Some(chapter_id) = update.chapter_id {
            if !state.chapters.rows.contains_key(&chapter_id) {
                return Err(not_found(EntityKind::Chapter, chapter_id).into());
            }
        }
        let page = state
            .pages
            .rows
            .get_mut(&id)
            .ok_or_else(|| not_found(EntityKind::Page, id))?;
        update.apply(page);
        page.updated_at = Utc::now();
        Ok(page.clone())
    }

    async fn delete(&self, id: EntityId) -> MangaResult<()> {
        let mut state = self.write()?;
        match state.pages.rows.remove(&id) {
            Some(_) => Ok(()),
            None => Err(not_found(EntityKind::Page, id).into()),
        }
    }

    async fn delete_by_chapter(&self, chapter_id: EntityId) -> MangaResult<u64> {
        let mut state = self.write()?;
        Ok(state.remove_chapter_pages(chapter_id))
    }
}

#[async_trait]
impl UserRepository for InMemoryCatalog {
    async fn create(&self, input: NewUser) -> MangaResult<User> {
        let mut state = self.write()?;
        state.ensure_unique_user(&input.username, &input.email, None)?;
        let now = Utc::now();
        let user = User {
            id: state.users.next_id(),
            username: input.username,
            email: input.email,
            password_hash: input.password_hash,
            role: input.role,
            created_at: now,
            updated_at: now,
        };
        state.users.rows.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get(&self, id: EntityId) -> MangaResult<User> {
        let state = self.read()?;
        Ok(state
            .users
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(EntityKind::User, id))?)
    }

    async fn get_by_username(&self, username: &str) -> MangaResult<User> {
        let state = self.read()?;
        Ok(state
            .users
            .rows
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| not_found(EntityKind::User, 0))?)
    }

    async fn get_by_email(&self, email: &str) -> MangaResult<User> {
        let state = self.read()?;
        Ok(state
            .users
            .rows
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| not_found(EntityKind::User, 0))?)
    }

    async fn update(&self, user: &User) -> MangaResult<User> {
        let mut state = self.write()?;
        state.ensure_unique_user(&user.username, &user.email, Some(user.id))?;
        let stored = state
            .users
            .rows
            .get_mut(&user.id)
            .ok_or_else(|| not_found(EntityKind::User, user.id))?;
        stored.username = user.username.clone();
        stored.email = user.email.clone();
        stored.password_hash = user.password_hash.clone();
        stored.role = user.role;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete(&self, id: EntityId) -> MangaResult<()> {
        let mut state = self.write()?;
        match state.users.rows.remove(&id) {
            Some(_) => Ok(()),
            None => Err(not_found(EntityKind::User, id).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manga_core::{ErrorKind, MangaError, Role};

    fn new_manga(title: &str) -> NewManga {
        NewManga {
            title: title.to_string(),
            genres: vec!["drama".to_string(), "action".to_string(), "drama".to_string()],
            ..NewManga::default()
        }
    }

    async fn seed_chapter(catalog: &InMemoryCatalog) -> MangaResult<(Manga, Chapter)> {
        let manga = MangaRepository::create(catalog, new_manga("Harbor")).await?;
        let chapter = ChapterRepository::create(
            catalog,
            NewChapter {
                manga_id: manga.id,
                number: 1.0,
                title: "Arrival".to_string(),
            },
        )
        .await?;
        Ok((manga, chapter))
    }

    #[tokio::test]
    async fn test_default_catalog_starts_empty_with_ids_from_one() -> MangaResult<()> {
        let catalog = InMemoryCatalog::default();
        assert_eq!(catalog.manga_count(), 0);
        assert_eq!(catalog.user_count(), 0);

        let (manga, chapter) = seed_chapter(&catalog).await?;
        assert_eq!(manga.id, 1);
        assert_eq!(chapter.id, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_manga_crud_and_genres() -> MangaResult<()> {
        let catalog = InMemoryCatalog::new();
        let manga = MangaRepository::create(&catalog, new_manga("Harbor")).await?;
        assert_eq!(manga.id, 1);
        assert_eq!(manga.genres, vec!["action", "drama"]);

        catalog.add_genre(manga.id, "comedy").await?;
        catalog.add_genre(manga.id, "comedy").await?;
        catalog.remove_genre(manga.id, "drama").await?;
        assert_eq!(catalog.genres(manga.id).await?, vec!["action", "comedy"]);

        let updated = MangaRepository::update(
            &catalog,
            manga.id,
            MangaUpdate {
                title: Some("Harbor Lights".to_string()),
                ..MangaUpdate::default()
            },
        )
        .await?;
        assert_eq!(updated.title, "Harbor Lights");
        assert!(updated.updated_at >= manga.updated_at);

        MangaRepository::delete(&catalog, manga.id).await?;
        let err = MangaRepository::get(&catalog, manga.id).await;
        assert_eq!(err, Err(MangaError::not_found(EntityKind::Manga, manga.id)));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_filters_and_paginates() -> MangaResult<()> {
        let catalog = InMemoryCatalog::new();
        for title in ["Alpha", "Beta", "Gamma"] {
            MangaRepository::create(&catalog, new_manga(title)).await?;
        }
        let page = catalog.list(&MangaFilter::page(2, 0)).await?;
        assert_eq!(page.len(), 2);
        let rest = catalog.list(&MangaFilter::page(2, 2)).await?;
        assert_eq!(rest.len(), 1);

        let titled = catalog
            .list(&MangaFilter {
                title: Some("amm".to_string()),
                ..MangaFilter::default()
            })
            .await?;
        assert_eq!(titled.len(), 1);
        assert_eq!(titled[0].title, "Gamma");
        Ok(())
    }

    #[tokio::test]
    async fn test_child_creation_requires_parent() {
        let catalog = InMemoryCatalog::new();
        let chapter = ChapterRepository::create(
            &catalog,
            NewChapter {
                manga_id: 99,
                number: 1.0,
                title: "Orphan".to_string(),
            },
        )
        .await;
        assert_eq!(chapter, Err(MangaError::not_found(EntityKind::Manga, 99)));

        let page = PageRepository::create(
            &catalog,
            NewPage {
                chapter_id: 5,
                number: 1,
                image_path: "p/1.png".to_string(),
            },
        )
        .await;
        assert_eq!(page, Err(MangaError::not_found(EntityKind::Chapter, 5)));
    }

    #[tokio::test]
    async fn test_manga_delete_cascades() -> MangaResult<()> {
        let catalog = InMemoryCatalog::new();
        let (manga, chapter) = seed_chapter(&catalog).await?;
        for number in [2, 1] {
            PageRepository::create(
                &catalog,
                NewPage {
                    chapter_id: chapter.id,
                    number,
                    image_path: format!("pages/{}.png", number),
                },
            )
            .await?;
        }
        let pages = catalog.list_by_chapter(chapter.id).await?;
        assert_eq!(pages.iter().map(|p| p.number).collect::<Vec<_>>(), vec![1, 2]);

        MangaRepository::delete(&catalog, manga.id).await?;
        assert_eq!(catalog.chapter_count(), 0);
        assert_eq!(catalog.page_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_page_move_requires_target_chapter() -> MangaResult<()> {
        let catalog = InMemoryCatalog::new();
        let (_, chapter) = seed_chapter(&catalog).await?;
        let page = PageRepository::create(
            &catalog,
            NewPage {
                chapter_id: chapter.id,
                number: 1,
                image_path: "a.png".to_string(),
            },
        )
        .await?;

        let moved = PageRepository::update(
            &catalog,
            page.id,
            PageUpdate {
                chapter_id: Some(404),
                ..PageUpdate::default()
            },
        )
        .await;
        assert_eq!(moved, Err(MangaError::not_found(EntityKind::Chapter, 404)));
        Ok(())
    }

    #[tokio::test]
    async fn test_user_uniqueness() -> MangaResult<()> {
        let catalog = InMemoryCatalog::new();
        let user = NewUser {
            username: "reader".to_string(),
            email: "reader@example.com".to_string(),
            password_hash: "hash".to_string(),
            role: Role::User,
        };
        let created = UserRepository::create(&catalog, user.clone()).await?;
        assert_eq!(catalog.get_by_email("reader@example.com").await?.id, created.id);

        let dup = UserRepository::create(&catalog, user.clone()).await;
        assert_eq!(dup.map_err(|e| e.kind()), Err(ErrorKind::Conflict));

        let other = UserRepository::create(
            &catalog,
            NewUser {
                username: "other".to_string(),
                email: "other@example.com".to_string(),
                ..user
            },
        )
        .await?;
        let mut renamed = other.clone();
        renamed.username = "reader".to_string();
        let clash = UserRepository::update(&catalog, &renamed).await;
        assert_eq!(clash.map_err(|e| e.code()), Err("USER_ALREADY_EXISTS"));

        assert!(catalog.get_by_username("nobody").await.is_err());
        Ok(())
    }
}
