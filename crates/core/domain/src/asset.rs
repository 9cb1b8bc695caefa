/// 资产身份：所有模块共享的最小标识。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetIdentity {
    pub id: String,
    pub fleet_no: u32,
    pub plate: String,
}

impl AssetIdentity {
    pub fn new(id: impl Into<String>, fleet_no: u32, plate: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fleet_no,
            plate: plate.into(),
        }
    }

    /// 车队编号的两位显示形式（`7` -> `07`）。
    pub fn fleet_label(&self) -> String {
        format!("{:02}", self.fleet_no)
    }
}
