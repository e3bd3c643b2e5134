use common::prelude::PermissionValue;
use serde::{Deserialize, Serialize};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::sqlite::{SqliteArgumentValue, SqliteTypeInfo, SqliteValueRef};
use sqlx::{Decode, Encode, Sqlite, Type};

/// Permission bitmask stored as INTEGER. Values outside `0..=255` are
/// rejected on decode rather than truncated.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, Eq, PartialEq, Hash, Default)]
#[serde(transparent)]
pub struct DPermission(PermissionValue);

impl From<DPermission> for PermissionValue {
    fn from(val: DPermission) -> Self {
        val.0
    }
}

impl From<PermissionValue> for DPermission {
    fn from(value: PermissionValue) -> Self {
        Self(value)
    }
}

impl std::ops::Deref for DPermission {
    type Target = PermissionValue;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Decode<'_, Sqlite> for DPermission {
    fn decode(value: SqliteValueRef<'_>) -> Result<Self, BoxDynError> {
        let i = <i64 as Decode<Sqlite>>::decode(value)?;
        let bits = u8::try_from(i)?;
        Ok(Self(PermissionValue::new(bits)))
    }
}

impl Encode<'_, Sqlite> for DPermission {
    fn encode_by_ref(
        &self,
        args: &mut Vec<SqliteArgumentValue<'_>>,
    ) -> Result<IsNull, BoxDynError> {
        args.push(SqliteArgumentValue::Int(i32::from(self.0.bits())));
        Ok(IsNull::No)
    }
}

impl Type<Sqlite> for DPermission {
    fn compatible(ty: &SqliteTypeInfo) -> bool {
        <i64 as Type<Sqlite>>::compatible(ty)
    }

    fn type_info() -> SqliteTypeInfo {
        <i64 as Type<Sqlite>>::type_info()
    }
}
