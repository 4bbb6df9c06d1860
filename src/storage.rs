use serde::{de::DeserializeOwned, Serialize};
use sled::{Db, Tree};
use std::marker::PhantomData;
use std::path::Path;

use crate::error::StoreError;
use crate::ids::RecordId;
use crate::models::{Activity, Deliverable, Project, User, Work};

/// A stored entity: a JSON document keyed by its record id.
pub trait Document: Serialize + DeserializeOwned {
    fn id(&self) -> &RecordId;
}

macro_rules! document {
    ($($ty:ty),+) => {
        $(impl Document for $ty {
            fn id(&self) -> &RecordId {
                &self.id
            }
        })+
    };
}

document!(User, Project, Work, Deliverable, Activity);

/// Documents that belong to a project.
pub trait ProjectScoped: Document {
    fn project(&self) -> &RecordId;
}

macro_rules! project_scoped {
    ($($ty:ty),+) => {
        $(impl ProjectScoped for $ty {
            fn project(&self) -> &RecordId {
                &self.project
            }
        })+
    };
}

project_scoped!(Work, Deliverable, Activity);

/// One Sled tree holding documents of a single type.
pub struct Collection<T> {
    tree: Tree,
    _doc: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
            _doc: PhantomData,
        }
    }
}

impl<T: Document> Collection<T> {
    fn open(db: &Db, name: &str) -> Result<Self, StoreError> {
        Ok(Self {
            tree: db.open_tree(name)?,
            _doc: PhantomData,
        })
    }

    pub fn get(&self, id: &RecordId) -> Result<Option<T>, StoreError> {
        match self.tree.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Writes the whole document, replacing any stored version.
    pub fn put(&self, doc: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(doc)?;
        self.tree.insert(doc.id().as_bytes(), bytes)?;
        Ok(())
    }

    pub fn remove(&self, id: &RecordId) -> Result<Option<T>, StoreError> {
        match self.tree.remove(id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn all(&self) -> Result<Vec<T>, StoreError> {
        let mut docs = vec![];
        for item in self.tree.iter() {
            let (_, value) = item?;
            docs.push(serde_json::from_slice(&value)?);
        }
        Ok(docs)
    }

    pub fn filter<P>(&self, mut predicate: P) -> Result<Vec<T>, StoreError>
    where
        P: FnMut(&T) -> bool,
    {
        let mut docs = self.all()?;
        docs.retain(|doc| predicate(doc));
        Ok(docs)
    }

    /// Load → mutate → save as a single atomic step.
    ///
    /// `mutate` runs against the freshest stored copy. If another writer
    /// replaced the document in between, the write is rejected by the
    /// compare-and-swap and `mutate` runs again on the newer copy, so it must
    /// not have side effects outside the document. Returns `None` when there
    /// is no document with this id.
    pub fn update_with<R, E, F>(&self, id: &RecordId, mut mutate: F) -> Result<Option<(T, R)>, E>
    where
        F: FnMut(&mut T) -> Result<R, E>,
        E: From<StoreError>,
    {
        loop {
            let Some(current) = self.tree.get(id.as_bytes()).map_err(StoreError::from)? else {
                return Ok(None);
            };
            let mut doc: T = serde_json::from_slice(&current).map_err(StoreError::from)?;
            let out = mutate(&mut doc)?;
            let next = serde_json::to_vec(&doc).map_err(StoreError::from)?;

            match self
                .tree
                .compare_and_swap(id.as_bytes(), Some(&current), Some(next))
                .map_err(StoreError::from)?
            {
                Ok(()) => return Ok(Some((doc, out))),
                Err(_) => {
                    tracing::debug!(id = %id, "concurrent write detected, retrying update");
                    continue;
                }
            }
        }
    }
}

impl<T: ProjectScoped> Collection<T> {
    pub fn for_project(&self, project: &RecordId) -> Result<Vec<T>, StoreError> {
        self.filter(|doc| doc.project() == project)
    }

    /// Looks up `ids` in order, skipping ones that no longer exist.
    pub fn resolve(&self, ids: &[RecordId]) -> Result<Vec<T>, StoreError> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(doc) = self.get(id)? {
                found.push(doc);
            }
        }
        Ok(found)
    }
}

#[derive(Clone)] // Sled handles are reference counted, clones share the same database
pub struct Storage {
    db: Db,
    pub users: Collection<User>,
    /// email → user id; enforces email uniqueness.
    user_emails: Tree,
    pub projects: Collection<Project>,
    pub works: Collection<Work>,
    pub deliverables: Collection<Deliverable>,
    pub activities: Collection<Activity>,
}

impl Storage {
    /// Open or create the Sled database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::from_db(sled::open(path)?)
    }

    /// In-memory database removed on drop, for tests and dry runs.
    pub fn temporary() -> Result<Self, StoreError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> Result<Self, StoreError> {
        Ok(Self {
            users: Collection::open(&db, "users")?,
            user_emails: db.open_tree("user_emails")?,
            projects: Collection::open(&db, "projects")?,
            works: Collection::open(&db, "works")?,
            deliverables: Collection::open(&db, "deliverables")?,
            activities: Collection::open(&db, "activities")?,
            db,
        })
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    // --- Users: the email index is kept next to the documents ---

    /// Atomically reserves `email` for `id`. Returns `false` if another user
    /// already holds it.
    pub fn claim_email(&self, email: &str, id: &RecordId) -> Result<bool, StoreError> {
        let swapped = self
            .user_emails
            .compare_and_swap(email.as_bytes(), None::<&[u8]>, Some(id.as_bytes()))?;
        match swapped {
            Ok(()) => Ok(true),
            Err(conflict) => Ok(conflict.current.as_deref() == Some(id.as_bytes())),
        }
    }

    /// Drops the reservation, but only if `id` still holds it.
    pub fn release_email(&self, email: &str, id: &RecordId) -> Result<(), StoreError> {
        let _ = self
            .user_emails
            .compare_and_swap(email.as_bytes(), Some(id.as_bytes()), None::<&[u8]>)?;
        Ok(())
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        match self.user_emails.get(email.as_bytes())? {
            Some(raw) => {
                let id = String::from_utf8_lossy(&raw).parse::<RecordId>();
                match id {
                    Ok(id) => self.users.get(&id),
                    Err(_) => Ok(None),
                }
            }
            None => Ok(None),
        }
    }

    /// Inserts a new user, failing with `Ok(false)` when the email is taken.
    pub fn create_user(&self, user: &User) -> Result<bool, StoreError> {
        if !self.claim_email(&user.email, &user.id)? {
            return Ok(false);
        }
        if let Err(err) = self.users.put(user) {
            self.release_email(&user.email, &user.id)?;
            return Err(err);
        }
        Ok(true)
    }

    pub fn delete_user(&self, id: &RecordId) -> Result<Option<User>, StoreError> {
        let removed = self.users.remove(id)?;
        if let Some(user) = &removed {
            self.release_email(&user.email, &user.id)?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::fs;

    fn user(email: &str) -> User {
        let now = Utc::now();
        User {
            id: RecordId::generate(),
            email: email.to_string(),
            password: "hash".to_string(),
            name: None,
            phone: None,
            avatar_url: None,
            admin: false,
            pm: false,
            token: None,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn work(project: &RecordId, name: &str) -> Work {
        Work {
            id: RecordId::generate(),
            name: name.to_string(),
            description: String::new(),
            work: vec![],
            deliverable: None,
            project: project.clone(),
        }
    }

    #[test]
    fn test_documents_survive_reopen() {
        // Use temp dir for isolated test DB
        let temp_dir = std::env::temp_dir().join("pmbook_test_storage_reopen");
        let _ = fs::remove_dir_all(&temp_dir);

        let project = RecordId::generate();
        let stored = work(&project, "Foundations");
        {
            let storage = Storage::open(&temp_dir).expect("Failed to open storage");
            storage.works.put(&stored).expect("Insert failed");
            storage.flush().unwrap();
        }

        let storage = Storage::open(&temp_dir).expect("Failed to reopen storage");
        let loaded = storage.works.get(&stored.id).unwrap().expect("work missing");
        assert_eq!(loaded.name, "Foundations");
        assert_eq!(loaded.project, project);

        drop(storage);
        let _ = fs::remove_dir_all(temp_dir);
    }

    #[test]
    fn duplicate_email_is_refused() {
        let storage = Storage::temporary().unwrap();
        let first = user("pm@example.com");
        let second = user("pm@example.com");

        assert!(storage.create_user(&first).unwrap());
        assert!(!storage.create_user(&second).unwrap());
        assert!(storage.users.get(&second.id).unwrap().is_none());

        let found = storage.find_user_by_email("pm@example.com").unwrap().unwrap();
        assert_eq!(found.id, first.id);
    }

    #[test]
    fn deleting_a_user_frees_the_email() {
        let storage = Storage::temporary().unwrap();
        let first = user("gone@example.com");
        storage.create_user(&first).unwrap();
        storage.delete_user(&first.id).unwrap();

        assert!(storage.find_user_by_email("gone@example.com").unwrap().is_none());
        assert!(storage.create_user(&user("gone@example.com")).unwrap());
    }

    #[test]
    fn project_scoped_listing_and_resolve() {
        let storage = Storage::temporary().unwrap();
        let p1 = RecordId::generate();
        let p2 = RecordId::generate();
        let a = work(&p1, "a");
        let b = work(&p1, "b");
        let c = work(&p2, "c");
        for w in [&a, &b, &c] {
            storage.works.put(w).unwrap();
        }

        let mut names: Vec<_> = storage
            .works
            .for_project(&p1)
            .unwrap()
            .into_iter()
            .map(|w| w.name)
            .collect();
        names.sort();
        assert_eq!(names, ["a", "b"]);

        let resolved = storage
            .works
            .resolve(&[c.id.clone(), RecordId::generate(), a.id.clone()])
            .unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].name, "c");
        assert_eq!(resolved[1].name, "a");
    }

    #[test]
    fn update_with_returns_none_for_missing_documents() {
        let storage = Storage::temporary().unwrap();
        let result = storage
            .works
            .update_with(&RecordId::generate(), |w| {
                w.name.push('!');
                Ok::<_, StoreError>(())
            })
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let storage = Storage::temporary().unwrap();
        let project = RecordId::generate();
        let mut doc = work(&project, "counter");
        doc.description = "0".to_string();
        storage.works.put(&doc).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let storage = storage.clone();
                let id = doc.id.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        storage
                            .works
                            .update_with(&id, |w| {
                                let n: u32 = w.description.parse().unwrap();
                                w.description = (n + 1).to_string();
                                Ok::<_, StoreError>(())
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stored = storage.works.get(&doc.id).unwrap().unwrap();
        assert_eq!(stored.description, "200");
    }
}
