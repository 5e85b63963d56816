#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use e2e_pages::config::Config;
use tempfile::TempDir;

pub const ROUTING: &str = r#"import { NgModule } from '@angular/core';
import { RouterModule, Routes } from '@angular/router';
import { DashboardComponent } from './dashboard/dashboard.component';
import { UsersPageComponent } from './users/users-page.component';

const routes: Routes = [
  { path: '', component: DashboardComponent },
  { path: 'users', component: UsersPageComponent },
  { path: '**', redirectTo: '' },
];

@NgModule({
  imports: [RouterModule.forRoot(routes)],
  exports: [RouterModule],
})
export class AppRoutingModule {}
"#;

pub const USERS_PAGE: &str = r#"<div class="page-loader" *ngIf="loading"></div>
<nav class="sidebar">
  <a routerLink="/users">Users</a>
  <a routerLink="/settings">Settings</a>
</nav>
<h1 data-e2e="title">Users</h1>
<table data-e2e-table="users">
  <thead>
    <tr><th>#</th><th>Name</th></tr>
  </thead>
  <tbody>
    <tr *ngFor="let u of users"><td>{{u.id}}</td><td>{{u.name}}</td></tr>
  </tbody>
</table>
<ul>
  <li *ngFor="let item of items; let i = index" data-e2e="item_row_{{i}}">{{item}}</li>
</ul>
<button (click)="save()">Save</button>
<app-user-card></app-user-card>
"#;

pub const USER_CARD: &str = r#"<div class="card">
  <span data-e2e="card_name">{{name}}</span>
</div>
"#;

pub const DASHBOARD: &str = r#"<h2 id="welcome">Welcome</h2>
"#;

/// A small Angular-style project on disk plus the config pointing at it.
pub struct Project {
    pub dir: TempDir,
    pub config: Config,
}

impl Project {
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn app(&self) -> PathBuf {
        self.root().join("src/app")
    }

    pub fn output(&self) -> PathBuf {
        self.config.project.output_path()
    }

    pub fn write(&self, relative: &str, contents: &str) {
        let path = self.root().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    pub fn read_output(&self, relative: &str) -> String {
        fs::read_to_string(self.output().join(relative)).unwrap()
    }
}

/// Empty project: only the config, rooted in a fresh temp dir.
pub fn empty_project() -> Project {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.project.root = dir.path().to_path_buf();
    Project { dir, config }
}

/// Dashboard + users page (which embeds a user card component).
pub fn sample_project() -> Project {
    let project = empty_project();
    project.write("src/app/app-routing.module.ts", ROUTING);
    project.write("src/app/users/users-page.component.html", USERS_PAGE);
    project.write("src/app/users/user-card.component.html", USER_CARD);
    project.write("src/app/dashboard/dashboard.component.html", DASHBOARD);
    project
}

pub fn relative_names(paths: &[PathBuf], base: &Path) -> Vec<String> {
    let mut names: Vec<String> = paths
        .iter()
        .map(|p| {
            p.strip_prefix(base)
                .unwrap_or(p)
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    names.sort();
    names
}
