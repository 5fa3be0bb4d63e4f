use async_trait::async_trait;
use std::time::Duration;

use super::abi::{self, ParamType, Token, TokenReader};
use super::rpc::JsonRpcClient;
use super::types::{
    unix_time, Account, AccountId, AccountType, Address, DigitalIdentity, IdentityProfile,
    NewAccount, TxHash, TxReceipt, U256,
};
use crate::error::{ChainError, DecodeError};

// Account registry
const GET_ACCOUNTS_BY_WALLET: &str = "getAccountsByWallet(address)";
const GET_ACCOUNT: &str = "getAccount(uint256)";
const GET_PRIMARY_ACCOUNT: &str = "getPrimaryAccount(address)";
const TOTAL_ACCOUNTS: &str = "totalAccounts()";
const CREATE_ACCOUNT: &str = "createAccount(string,address,uint8,string,uint256)";
const UPDATE_ACCOUNT: &str = "updateAccount(uint256,string,string)";
const DEACTIVATE_ACCOUNT: &str = "deactivateAccount(uint256)";
pub const ACCOUNT_CREATED_EVENT: &str = "AccountCreated(uint256,address,address,uint8,string)";

// Digital ID
const IDS: &str = "ids(address)";
const REGISTER_ID: &str = "registerID(string,string,string,string)";
const DEACTIVATE_ID: &str = "deactivateID()";

// Plot registry
const OWNER_OF_PLOT: &str = "ownerOfPlot(uint256)";
const ACTIVATED: &str = "activated(uint256)";
const URI: &str = "uri(uint256)";
const REQUEST_TRANSFER: &str = "requestTransfer(uint256,address)";

/// Typed reads and writes against the deployed contracts.
///
/// Contract addresses are passed per call; the client holds no address table.
/// Writes return the transaction hash as soon as the node accepts the
/// submission. Nothing about the outcome is known until
/// [`ChainClient::wait_for_receipt`] resolves.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Deployed bytecode at `address`; empty when nothing is deployed.
    async fn get_code(&self, address: Address) -> Result<Vec<u8>, ChainError>;

    async fn get_accounts_by_wallet(
        &self,
        registry: Address,
        wallet: Address,
    ) -> Result<Vec<AccountId>, ChainError>;

    async fn get_account(&self, registry: Address, id: AccountId) -> Result<Account, ChainError>;

    /// Raw primary pointer; `0` means none.
    async fn get_primary_account(
        &self,
        registry: Address,
        wallet: Address,
    ) -> Result<AccountId, ChainError>;

    async fn total_accounts(&self, registry: Address) -> Result<u64, ChainError>;

    async fn create_account(
        &self,
        registry: Address,
        from: Address,
        account: &NewAccount,
    ) -> Result<TxHash, ChainError>;

    async fn update_account(
        &self,
        registry: Address,
        from: Address,
        id: AccountId,
        name: &str,
        description: &str,
    ) -> Result<TxHash, ChainError>;

    async fn deactivate_account(
        &self,
        registry: Address,
        from: Address,
        id: AccountId,
    ) -> Result<TxHash, ChainError>;

    async fn identity_of(
        &self,
        contract: Address,
        user: Address,
    ) -> Result<DigitalIdentity, ChainError>;

    async fn register_id(
        &self,
        contract: Address,
        from: Address,
        profile: &IdentityProfile,
    ) -> Result<TxHash, ChainError>;

    async fn deactivate_id(&self, contract: Address, from: Address) -> Result<TxHash, ChainError>;

    async fn owner_of_plot(&self, contract: Address, plot_id: u64) -> Result<Address, ChainError>;

    async fn activated(&self, contract: Address, plot_id: u64) -> Result<bool, ChainError>;

    async fn uri(&self, contract: Address, plot_id: u64) -> Result<String, ChainError>;

    async fn request_transfer(
        &self,
        contract: Address,
        from: Address,
        plot_id: u64,
        new_owner: Address,
    ) -> Result<TxHash, ChainError>;

    async fn wait_for_receipt(&self, hash: &TxHash) -> Result<TxReceipt, ChainError>;
}

/// Id of the account announced by an `AccountCreated` log from `registry`.
pub fn account_created_id(receipt: &TxReceipt, registry: Address) -> Option<AccountId> {
    let topic0 = abi::event_topic(ACCOUNT_CREATED_EVENT);
    receipt
        .logs
        .iter()
        .filter(|entry| entry.address == registry)
        .filter(|entry| entry.topics.first() == Some(&topic0))
        .find_map(|entry| {
            let raw = abi::topic_to_uint(entry.topics.get(1)?);
            match abi::narrow_u64(raw) {
                Ok(id) => Some(id),
                Err(e) => {
                    log::debug!("AccountCreated log carried an unreadable id {}: {}", raw, e);
                    None
                }
            }
        })
}

fn uint(value: u64) -> Token {
    Token::Uint(U256::from(value))
}

/// [`ChainClient`] over a JSON-RPC node.
///
/// Writes go through `eth_sendTransaction`, so the session address must be a
/// key the node (or the wallet proxy in front of it) can sign for.
pub struct EvmChainClient {
    rpc: JsonRpcClient,
    receipt_poll_attempts: u32,
    receipt_poll_interval: Duration,
}

impl EvmChainClient {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc: JsonRpcClient::new(rpc_url),
            receipt_poll_attempts: 60,
            receipt_poll_interval: Duration::from_secs(2),
        }
    }

    pub fn with_receipt_polling(mut self, attempts: u32, interval: Duration) -> Self {
        self.receipt_poll_attempts = attempts.max(1);
        self.receipt_poll_interval = interval;
        self
    }

    async fn read(
        &self,
        contract: Address,
        signature: &str,
        args: &[Token],
        outputs: &[ParamType],
    ) -> Result<TokenReader, ChainError> {
        let calldata = abi::encode_call(signature, args);
        let raw = self.rpc.eth_call(contract, &calldata).await?;
        let tokens = abi::decode(outputs, &raw)?;
        Ok(TokenReader::new(tokens))
    }

    async fn write(
        &self,
        contract: Address,
        from: Address,
        signature: &str,
        args: &[Token],
    ) -> Result<TxHash, ChainError> {
        let calldata = abi::encode_call(signature, args);
        let hash = self.rpc.send_transaction(from, contract, &calldata).await?;
        log::info!("Submitted {} to {}: {}", signature, contract, hash);
        Ok(hash)
    }
}

fn account_tuple() -> ParamType {
    ParamType::Tuple(vec![
        ParamType::Uint,    // id
        ParamType::String,  // name
        ParamType::Address, // walletAddress
        ParamType::Uint,    // accountType
        ParamType::Address, // ownerWallet
        ParamType::String,  // description
        ParamType::Address, // parentAccount
        ParamType::Bool,    // isActive
        ParamType::Uint,    // createdAt
        ParamType::Uint,    // updatedAt
    ])
}

fn read_account(reader: &mut TokenReader) -> Result<Account, DecodeError> {
    let id = abi::narrow_u64(reader.uint()?)?;
    let name = reader.string()?;
    let wallet_address = reader.address()?;
    // Unknown discriminants, however wide, read as personal
    let account_type = AccountType::from_index(u64::try_from(reader.uint()?).unwrap_or(u64::MAX));
    let owner_wallet = reader.address()?;
    let description = reader.string()?;
    let parent = reader.address()?;
    let is_active = reader.bool()?;
    let created_at = unix_time(reader.uint()?);
    let updated_at = unix_time(reader.uint()?);

    Ok(Account {
        id,
        name,
        wallet_address,
        account_type,
        owner_wallet,
        description,
        parent_account: (!parent.is_zero()).then_some(parent),
        is_active,
        created_at,
        updated_at,
    })
}

#[async_trait]
impl ChainClient for EvmChainClient {
    async fn get_code(&self, address: Address) -> Result<Vec<u8>, ChainError> {
        self.rpc.get_code(address).await
    }

    async fn get_accounts_by_wallet(
        &self,
        registry: Address,
        wallet: Address,
    ) -> Result<Vec<AccountId>, ChainError> {
        let mut reader = self
            .read(
                registry,
                GET_ACCOUNTS_BY_WALLET,
                &[Token::Address(wallet)],
                &[ParamType::UintArray],
            )
            .await?;
        let ids = reader
            .uint_array()?
            .into_iter()
            .filter_map(|raw| match abi::narrow_u64(raw) {
                Ok(id) => Some(id),
                Err(_) => {
                    log::warn!("Skipping account id {} of {}: wider than 64 bits", raw, wallet);
                    None
                }
            })
            .collect();
        Ok(ids)
    }

    async fn get_account(&self, registry: Address, id: AccountId) -> Result<Account, ChainError> {
        let mut reader = self
            .read(registry, GET_ACCOUNT, &[uint(id)], &[account_tuple()])
            .await?;
        let mut record = reader.tuple()?;
        Ok(read_account(&mut record)?)
    }

    async fn get_primary_account(
        &self,
        registry: Address,
        wallet: Address,
    ) -> Result<AccountId, ChainError> {
        let mut reader = self
            .read(
                registry,
                GET_PRIMARY_ACCOUNT,
                &[Token::Address(wallet)],
                &[ParamType::Uint],
            )
            .await?;
        // A pointer wider than any listed id cannot name one of them
        Ok(u64::try_from(reader.uint()?).unwrap_or(0))
    }

    async fn total_accounts(&self, registry: Address) -> Result<u64, ChainError> {
        let mut reader = self
            .read(registry, TOTAL_ACCOUNTS, &[], &[ParamType::Uint])
            .await?;
        Ok(abi::narrow_u64(reader.uint()?)?)
    }

    async fn create_account(
        &self,
        registry: Address,
        from: Address,
        account: &NewAccount,
    ) -> Result<TxHash, ChainError> {
        self.write(
            registry,
            from,
            CREATE_ACCOUNT,
            &[
                Token::String(account.name.clone()),
                Token::Address(account.wallet_address),
                uint(u64::from(account.account_type.index())),
                Token::String(account.description.clone()),
                uint(account.parent_account_id.unwrap_or(0)),
            ],
        )
        .await
    }

    async fn update_account(
        &self,
        registry: Address,
        from: Address,
        id: AccountId,
        name: &str,
        description: &str,
    ) -> Result<TxHash, ChainError> {
        self.write(
            registry,
            from,
            UPDATE_ACCOUNT,
            &[
                uint(id),
                Token::String(name.to_string()),
                Token::String(description.to_string()),
            ],
        )
        .await
    }

    async fn deactivate_account(
        &self,
        registry: Address,
        from: Address,
        id: AccountId,
    ) -> Result<TxHash, ChainError> {
        self.write(registry, from, DEACTIVATE_ACCOUNT, &[uint(id)])
            .await
    }

    async fn identity_of(
        &self,
        contract: Address,
        user: Address,
    ) -> Result<DigitalIdentity, ChainError> {
        let mut reader = self
            .read(
                contract,
                IDS,
                &[Token::Address(user)],
                &[
                    ParamType::String,
                    ParamType::String,
                    ParamType::String,
                    ParamType::String,
                    ParamType::Uint,
                    ParamType::Bool,
                ],
            )
            .await?;

        Ok(DigitalIdentity {
            first_name: reader.string()?,
            last_name: reader.string()?,
            email: reader.string()?,
            avatar_uri: reader.string()?,
            registered_at: unix_time(reader.uint()?),
            active: reader.bool()?,
        })
    }

    async fn register_id(
        &self,
        contract: Address,
        from: Address,
        profile: &IdentityProfile,
    ) -> Result<TxHash, ChainError> {
        self.write(
            contract,
            from,
            REGISTER_ID,
            &[
                Token::String(profile.first_name.clone()),
                Token::String(profile.last_name.clone()),
                Token::String(profile.email.clone()),
                Token::String(profile.avatar_uri.clone()),
            ],
        )
        .await
    }

    async fn deactivate_id(&self, contract: Address, from: Address) -> Result<TxHash, ChainError> {
        self.write(contract, from, DEACTIVATE_ID, &[]).await
    }

    async fn owner_of_plot(&self, contract: Address, plot_id: u64) -> Result<Address, ChainError> {
        let mut reader = self
            .read(
                contract,
                OWNER_OF_PLOT,
                &[uint(plot_id)],
                &[ParamType::Address],
            )
            .await?;
        Ok(reader.address()?)
    }

    async fn activated(&self, contract: Address, plot_id: u64) -> Result<bool, ChainError> {
        let mut reader = self
            .read(contract, ACTIVATED, &[uint(plot_id)], &[ParamType::Bool])
            .await?;
        Ok(reader.bool()?)
    }

    async fn uri(&self, contract: Address, plot_id: u64) -> Result<String, ChainError> {
        let mut reader = self
            .read(contract, URI, &[uint(plot_id)], &[ParamType::String])
            .await?;
        Ok(reader.string()?)
    }

    async fn request_transfer(
        &self,
        contract: Address,
        from: Address,
        plot_id: u64,
        new_owner: Address,
    ) -> Result<TxHash, ChainError> {
        self.write(
            contract,
            from,
            REQUEST_TRANSFER,
            &[uint(plot_id), Token::Address(new_owner)],
        )
        .await
    }

    /// Poll for the receipt until it shows up or attempts run out.
    async fn wait_for_receipt(&self, hash: &TxHash) -> Result<TxReceipt, ChainError> {
        for attempt in 1..=self.receipt_poll_attempts {
            match self.rpc.get_transaction_receipt(hash).await {
                Ok(Some(receipt)) => {
                    log::debug!(
                        "Receipt for {} after {} attempt(s): {:?}",
                        hash,
                        attempt,
                        receipt.status
                    );
                    return Ok(receipt);
                }
                Ok(None) => {
                    // Not yet included
                }
                Err(ChainError::Transport(e)) => {
                    log::warn!("Receipt poll for {} failed ({}), retrying", hash, e);
                }
                Err(e) => return Err(e),
            }

            if attempt < self.receipt_poll_attempts {
                tokio::time::sleep(self.receipt_poll_interval).await;
            }
        }

        Err(ChainError::NotIncluded {
            hash: hash.clone(),
            attempts: self.receipt_poll_attempts,
        })
    }
}
