use async_trait::async_trait;
use provisync_cloud::AsyncOperationLock;
use provisync_cloud_compute::error::BACKUP_CLIENT_NOT_FOUND;
use provisync_cloud_compute::{
    ApiError, ApiResult, BackupClient, ComputeApi, Disk, DiskSpeed, NetworkAdapter, Provisioner,
    Server,
};
use provisync_config::ProviderSettings;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// In-memory compute API that records every call it receives
#[derive(Clone)]
pub struct FakeComputeApi {
    state: Arc<Mutex<FakeState>>,
    lock: AsyncOperationLock,
}

pub struct FakeState {
    pub server: Server,
    pub backup_clients: Vec<BackupClient>,

    /// Backup clients with jobs that can be cancelled
    pub running_jobs: HashSet<String>,

    /// Every call, in order, as `name` or `name:target`
    pub calls: Vec<String>,

    /// Mutating calls made without the operation lock, and polls made with it
    pub lock_violations: Vec<String>,

    /// Answer this many upcoming mutating calls with a busy error
    pub busy_responses: u32,

    /// Fail the first mutating call whose name starts with the prefix
    pub failures: Vec<(String, ApiError)>,

    /// Accept additions without ever listing them
    pub lose_created: bool,

    pub page_size: usize,
    next_id: u32,
}

#[allow(dead_code)]
impl FakeComputeApi {
    pub fn new(server: Server) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                server,
                backup_clients: Vec::new(),
                running_jobs: HashSet::new(),
                calls: Vec::new(),
                lock_violations: Vec::new(),
                busy_responses: 0,
                failures: Vec::new(),
                lose_created: false,
                page_size: 2,
                next_id: 1,
            })),
            lock: AsyncOperationLock::new(),
        }
    }

    pub fn lock(&self) -> &AsyncOperationLock {
        &self.lock
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Mutating calls only, without their targets
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|call| call.split(':').next().unwrap_or_default().to_string())
            .filter(|name| !matches!(name.as_str(), "get_server" | "list_backup_clients" | "wait"))
            .collect()
    }

    pub fn server(&self) -> Server {
        self.state().server.clone()
    }

    pub fn fail_next(&self, call_prefix: &str, error: ApiError) {
        self.state().failures.push((call_prefix.to_string(), error));
    }

    fn read(&self, call: String) -> MutexGuard<'_, FakeState> {
        let mut state = self.state();
        state.calls.push(call);
        state
    }

    fn mutate(&self, call: String) -> ApiResult<MutexGuard<'_, FakeState>> {
        let mut state = self.state();
        if !self.lock.is_locked() {
            state.lock_violations.push(call.clone());
        }
        state.calls.push(call.clone());

        if state.busy_responses > 0 {
            state.busy_responses -= 1;
            return Err(ApiError::busy(format!("server is busy ({})", call)));
        }
        if let Some(index) = state
            .failures
            .iter()
            .position(|(prefix, _)| call.starts_with(prefix.as_str()))
        {
            let (_, error) = state.failures.remove(index);
            return Err(error);
        }

        Ok(state)
    }

    fn poll(&self, call: String) -> MutexGuard<'_, FakeState> {
        let mut state = self.state();
        if self.lock.is_locked() {
            state.lock_violations.push(call.clone());
        }
        state.calls.push(call);
        state
    }
}

impl FakeState {
    fn next_id(&mut self, prefix: &str) -> String {
        let id = format!("{}-{}", prefix, self.next_id);
        self.next_id += 1;
        id
    }
}

#[async_trait]
impl ComputeApi for FakeComputeApi {
    async fn get_server(&self, server_id: &str) -> ApiResult<Option<Server>> {
        let state = self.read(format!("get_server:{}", server_id));
        Ok((state.server.id == server_id).then(|| state.server.clone()))
    }

    async fn shutdown_server(&self, _server_id: &str) -> ApiResult<()> {
        let mut state = self.mutate("shutdown_server".to_string())?;
        state.server.started = false;
        Ok(())
    }

    async fn start_server(&self, _server_id: &str) -> ApiResult<()> {
        let mut state = self.mutate("start_server".to_string())?;
        state.server.started = true;
        Ok(())
    }

    async fn wait_for_change(
        &self,
        _server_id: &str,
        action: &str,
        _timeout: Duration,
    ) -> ApiResult<Server> {
        let state = self.poll(format!("wait:{}", action));
        Ok(state.server.clone())
    }

    async fn add_disk(&self, _server_id: &str, disk: &Disk) -> ApiResult<String> {
        let mut state = self.mutate(format!("add_disk:{}", disk.scsi_path()))?;
        let id = state.next_id("disk");
        if !state.lose_created {
            state.server.disks.push(disk.clone().with_id(id.clone()));
        }
        Ok(id)
    }

    async fn expand_disk(
        &self,
        _server_id: &str,
        disk_id: &str,
        new_size_gb: u32,
    ) -> ApiResult<()> {
        let mut state = self.mutate(format!("expand_disk:{}", disk_id))?;
        let disk = state
            .server
            .disks
            .iter_mut()
            .find(|d| d.id.as_deref() == Some(disk_id))
            .ok_or_else(|| ApiError::not_found(disk_id))?;
        disk.size_gb = new_size_gb;
        Ok(())
    }

    async fn change_disk_speed(
        &self,
        _server_id: &str,
        disk_id: &str,
        speed: DiskSpeed,
    ) -> ApiResult<()> {
        let mut state = self.mutate(format!("change_disk_speed:{}", disk_id))?;
        let disk = state
            .server
            .disks
            .iter_mut()
            .find(|d| d.id.as_deref() == Some(disk_id))
            .ok_or_else(|| ApiError::not_found(disk_id))?;
        disk.speed = speed;
        Ok(())
    }

    async fn remove_disk(&self, _server_id: &str, disk_id: &str) -> ApiResult<()> {
        let mut state = self.mutate(format!("remove_disk:{}", disk_id))?;
        let before = state.server.disks.len();
        state.server.disks.retain(|d| d.id.as_deref() != Some(disk_id));
        if state.server.disks.len() == before {
            return Err(ApiError::not_found(disk_id));
        }
        Ok(())
    }

    async fn add_network_adapter(
        &self,
        _server_id: &str,
        adapter: &NetworkAdapter,
    ) -> ApiResult<String> {
        let mut state = self.mutate(format!("add_network_adapter:{}", adapter.vlan_id))?;
        let id = state.next_id("nic");
        let mut created = adapter.clone().with_id(id.clone());
        created.private_ipv4.get_or_insert_with(|| "10.0.1.100".to_string());
        created.adapter_type.get_or_insert_with(|| "E1000".to_string());
        state.server.network_adapters.push(created);
        Ok(id)
    }

    async fn change_network_adapter_ipv4(
        &self,
        _server_id: &str,
        adapter_id: &str,
        ipv4: &str,
    ) -> ApiResult<()> {
        let mut state = self.mutate(format!("change_network_adapter_ipv4:{}", adapter_id))?;
        let adapter = state
            .server
            .network_adapters
            .iter_mut()
            .find(|a| a.id.as_deref() == Some(adapter_id))
            .ok_or_else(|| ApiError::not_found(adapter_id))?;
        adapter.private_ipv4 = Some(ipv4.to_string());
        Ok(())
    }

    async fn change_network_adapter_type(
        &self,
        _server_id: &str,
        adapter_id: &str,
        adapter_type: &str,
    ) -> ApiResult<()> {
        let mut state = self.mutate(format!("change_network_adapter_type:{}", adapter_id))?;
        let adapter = state
            .server
            .network_adapters
            .iter_mut()
            .find(|a| a.id.as_deref() == Some(adapter_id))
            .ok_or_else(|| ApiError::not_found(adapter_id))?;
        adapter.adapter_type = Some(adapter_type.to_string());
        Ok(())
    }

    async fn remove_network_adapter(&self, _server_id: &str, adapter_id: &str) -> ApiResult<()> {
        let mut state = self.mutate(format!("remove_network_adapter:{}", adapter_id))?;
        let before = state.server.network_adapters.len();
        state
            .server
            .network_adapters
            .retain(|a| a.id.as_deref() != Some(adapter_id));
        if state.server.network_adapters.len() == before {
            return Err(ApiError::not_found(adapter_id));
        }
        Ok(())
    }

    async fn list_backup_clients(
        &self,
        server_id: &str,
        page: u32,
    ) -> ApiResult<Vec<BackupClient>> {
        let state = self.read(format!("list_backup_clients:{}", page));
        if state.server.id != server_id {
            return Err(ApiError::not_found(server_id));
        }
        let start = (page as usize - 1) * state.page_size;
        Ok(state
            .backup_clients
            .iter()
            .skip(start)
            .take(state.page_size)
            .cloned()
            .collect())
    }

    async fn add_backup_client(
        &self,
        _server_id: &str,
        client: &BackupClient,
    ) -> ApiResult<String> {
        let mut state = self.mutate(format!("add_backup_client:{}", client.client_type))?;
        let id = state.next_id("backup");
        if !state.lose_created {
            let mut created = client.clone().with_id(id.clone());
            created.download_url = Some(format!("https://backup.example.com/{}", id));
            state.backup_clients.push(created);
        }
        Ok(id)
    }

    async fn modify_backup_client(&self, _server_id: &str, client: &BackupClient) -> ApiResult<()> {
        let client_id = client.id.clone().unwrap_or_default();
        let mut state = self.mutate(format!("modify_backup_client:{}", client_id))?;
        let existing = state
            .backup_clients
            .iter_mut()
            .find(|c| c.id.as_deref() == Some(client_id.as_str()))
            .ok_or_else(|| ApiError::new(BACKUP_CLIENT_NOT_FOUND, client_id.clone()))?;
        existing.schedule_policy = client.schedule_policy.clone();
        existing.storage_policy = client.storage_policy.clone();
        existing.alerting = client.alerting.clone();
        Ok(())
    }

    async fn cancel_backup_client_jobs(&self, _server_id: &str, client_id: &str) -> ApiResult<()> {
        let mut state = self.mutate(format!("cancel_backup_client_jobs:{}", client_id))?;
        if !state.running_jobs.remove(client_id) {
            return Err(ApiError::new(
                BACKUP_CLIENT_NOT_FOUND,
                format!("no running jobs for {}", client_id),
            ));
        }
        Ok(())
    }

    async fn remove_backup_client(&self, _server_id: &str, client_id: &str) -> ApiResult<()> {
        let mut state = self.mutate(format!("remove_backup_client:{}", client_id))?;
        let before = state.backup_clients.len();
        state
            .backup_clients
            .retain(|c| c.id.as_deref() != Some(client_id));
        if state.backup_clients.len() == before {
            return Err(ApiError::new(BACKUP_CLIENT_NOT_FOUND, client_id));
        }
        Ok(())
    }

    async fn wait_for_backup_status_normal(
        &self,
        _server_id: &str,
        _timeout: Duration,
    ) -> ApiResult<()> {
        let _state = self.poll("wait:backup status".to_string());
        Ok(())
    }
}

#[allow(dead_code)]
pub fn server(started: bool, disks: Vec<Disk>) -> Server {
    Server {
        id: "server-1".to_string(),
        name: "web-01".to_string(),
        started,
        disks,
        network_adapters: vec![NetworkAdapter {
            id: Some("nic-primary".to_string()),
            vlan_id: "vlan-primary".to_string(),
            private_ipv4: Some("10.0.0.10".to_string()),
            adapter_type: Some("E1000".to_string()),
            primary: true,
        }],
    }
}

#[allow(dead_code)]
pub fn test_settings() -> ProviderSettings {
    ProviderSettings {
        retry_delay: 1,
        retry_timeout: 30,
        ..ProviderSettings::default()
    }
}

#[allow(dead_code)]
pub fn provisioner(api: &FakeComputeApi) -> Provisioner<FakeComputeApi> {
    provisioner_with(api, test_settings())
}

#[allow(dead_code)]
pub fn provisioner_with(
    api: &FakeComputeApi,
    settings: ProviderSettings,
) -> Provisioner<FakeComputeApi> {
    init_tracing();
    Provisioner::new(api.clone(), settings, api.lock().clone())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
