//! Fixture builders for examinations seeded through the dispatcher

use uuid::Uuid;

use capillary_core::models::{Examination, Image, User};
use capillary_core::orchestration::{ExaminationDispatcher, NewImage};
use capillary_core::repositories::Repositories;

/// Builder for an examination with attached images
pub struct ExaminationBuilder {
    description: String,
    image_paths: Vec<String>,
}

impl ExaminationBuilder {
    pub fn new() -> Self {
        Self {
            description: "Nailfold capillaroscopy".to_string(),
            image_paths: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Attach `count` images named `frame_<n>.jpg`
    pub fn with_images(mut self, count: usize) -> Self {
        self.image_paths
            .extend((1..=count).map(|n| format!("/data/captures/frame_{n}.jpg")));
        self
    }

    pub fn with_image_path(mut self, path: &str) -> Self {
        self.image_paths.push(path.to_string());
        self
    }

    pub async fn create(self, dispatcher: &ExaminationDispatcher) -> (Examination, Vec<Image>) {
        let examination = dispatcher
            .create_examination(Uuid::new_v4(), Uuid::new_v4(), &self.description)
            .await
            .expect("create examination");

        let mut images = Vec::with_capacity(self.image_paths.len());
        for path in self.image_paths {
            let filename = path.rsplit('/').next().unwrap_or(&path).to_string();
            let image = dispatcher
                .attach_image(
                    examination.id,
                    NewImage {
                        filename,
                        file_path: path,
                        file_size: 48_213,
                        mime_type: "image/jpeg".to_string(),
                    },
                )
                .await
                .expect("attach image");
            images.push(image);
        }

        (examination, images)
    }
}

impl Default for ExaminationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Store the account that signs generated reports
pub async fn seed_system_user(repositories: &Repositories) -> User {
    let user = User::new("system", "Automated Analysis");
    repositories
        .users
        .create(&user)
        .await
        .expect("create system user");
    user
}
